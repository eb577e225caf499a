// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! On-device Play Integrity verification and verdict tracking.
//!
//! This crate checks the integrity verdicts Google Play issues for a device
//! and app, keeps the last observed verdicts, and reports when they change.
//!
//! The API allows:
//! * Generating request nonces and unsealing integrity tokens (a JWE wrapping
//!   an ES256 JWS) with locally provisioned keys ([`token`])
//! * Persisting the latest verdicts as a single atomically replaced record
//!   that observers can subscribe to ([`store`])
//! * Running checks end to end, detecting verdict changes and scheduling
//!   periodic checks with backoff ([`check`])

pub mod check;
pub mod store;
pub mod token;
