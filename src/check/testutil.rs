// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Scripted collaborators for exercising checks.

use super::detector::ChangeEvent;
use super::surfaces::{BoxError, IDisplaySurface, INotifier, ITokenIssuer};
use crate::store::VerdictSnapshot;
use crate::token::testutil;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

/// What the issuer does on its next call
pub enum Reply {
    /// Seal a statement echoing the request nonce
    Statement(Vec<&'static str>),
    /// Seal a statement answering some other request
    StaleNonce,
    /// Seal a valid statement under a decryption key nobody configured
    ForeignEncryption,
    Fail(&'static str),
    /// Never answer
    Hang,
}

impl Reply {
    pub fn statement(device: &[&'static str]) -> Reply {
        Reply::Statement(device.to_vec())
    }
}

/// A token issuer following a script.  Once the script runs out every
/// request fails.
pub struct ScriptedIssuer {
    replies: Mutex<VecDeque<Reply>>,
    nonces: Mutex<Vec<String>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedIssuer {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            nonces: Default::default(),
            calls: Default::default(),
        }
    }

    /// The nonces received so far
    pub fn nonces(&self) -> Vec<String> {
        self.nonces.lock().unwrap().clone()
    }

    /// When each request was made
    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ITokenIssuer for ScriptedIssuer {
    async fn request_token(&self, nonce: &str) -> Result<String, BoxError> {
        self.nonces.lock().unwrap().push(nonce.to_string());
        self.calls.lock().unwrap().push(Instant::now());

        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Statement(device)) => Ok(testutil::seal(&testutil::statement(
                Some(nonce),
                &device,
                Some("PLAY_RECOGNIZED"),
                Some("LICENSED"),
            ))),
            Some(Reply::StaleNonce) => Ok(testutil::seal(&testutil::statement(
                Some("c3RhbGU="),
                &["MEETS_STRONG_INTEGRITY"],
                None,
                None,
            ))),
            Some(Reply::ForeignEncryption) => {
                let jws = testutil::sign(&testutil::statement(Some(nonce), &[], None, None));
                Ok(testutil::encrypt_with(
                    &[0x5a; 32],
                    jws.as_bytes(),
                    "A256KW",
                    "A256GCM",
                ))
            }
            Some(Reply::Fail(msg)) => Err(msg.into()),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err("script exhausted".into()),
        }
    }
}

/// A display surface remembering what it was asked to show
#[derive(Default)]
pub struct RecordingDisplay {
    shown: Mutex<Vec<(Instant, VerdictSnapshot)>>,
    fail: bool,
}

impl RecordingDisplay {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn refreshes(&self) -> usize {
        self.shown.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<VerdictSnapshot> {
        self.shown.lock().unwrap().last().map(|(_, s)| s.clone())
    }

    /// When each refresh happened
    pub fn times(&self) -> Vec<Instant> {
        self.shown.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl IDisplaySurface for RecordingDisplay {
    async fn refresh(&self, snapshot: &VerdictSnapshot) -> Result<(), BoxError> {
        self.shown
            .lock()
            .unwrap()
            .push((Instant::now(), snapshot.clone()));

        if self.fail {
            return Err("display gone".into());
        }
        Ok(())
    }
}

/// A notifier remembering what it was asked to post
#[derive(Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<ChangeEvent>>,
    failures: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn changes(&self) -> Vec<ChangeEvent> {
        self.changes.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }

    fn result(&self) -> Result<(), BoxError> {
        if self.fail {
            return Err("permission revoked".into());
        }
        Ok(())
    }
}

#[async_trait]
impl INotifier for RecordingNotifier {
    async fn notify_change(&self, event: &ChangeEvent) -> Result<(), BoxError> {
        self.changes.lock().unwrap().push(event.clone());
        self.result()
    }

    async fn notify_failure(&self, message: &str) -> Result<(), BoxError> {
        self.failures.lock().unwrap().push(message.to_string());
        self.result()
    }
}
