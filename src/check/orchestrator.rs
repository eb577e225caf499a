// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::detector::{self, ChangeEvent};
use super::errors::Error;
use super::surfaces::{IDisplaySurface, INotifier, ITokenIssuer};
use crate::store::{IKeyValueStore, Settings, VerdictSnapshot, VerdictStore};
use crate::token::{self, IntegrityStatement, KeyConfig};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The result of a successful check
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// The snapshot written for this check
    pub snapshot: Arc<VerdictSnapshot>,
    /// What changed since the previous check, if there was one to compare
    /// with.  Set regardless of whether alerts are enabled.
    pub change: Option<ChangeEvent>,
    /// The authenticated statement the verdicts were taken from
    pub statement: IntegrityStatement,
}

/// Runs one integrity check from nonce to display refresh.
///
/// A check reads the previous snapshot and the settings, requests a token
/// bound to a fresh nonce, verifies it, records the verdicts, reports any
/// change and refreshes the display surfaces.  Every failure is recorded in
/// the verdict store before it is returned.
pub struct Orchestrator {
    store: Arc<VerdictStore>,
    settings: Arc<dyn IKeyValueStore>,
    keys: KeyConfig,
    issuer: Arc<dyn ITokenIssuer>,
    displays: Vec<Arc<dyn IDisplaySurface>>,
    notifier: Option<Arc<dyn INotifier>>,
    nonce_length: usize,
}

impl Orchestrator {
    pub fn new(
        store: Arc<VerdictStore>,
        settings: Arc<dyn IKeyValueStore>,
        keys: KeyConfig,
        issuer: Arc<dyn ITokenIssuer>,
    ) -> Self {
        Self {
            store,
            settings,
            keys,
            issuer,
            displays: Vec::new(),
            notifier: None,
            nonce_length: token::DEFAULT_NONCE_LENGTH,
        }
    }

    pub fn with_display(mut self, display: Arc<dyn IDisplaySurface>) -> Self {
        self.displays.push(display);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn INotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_nonce_length(mut self, length: usize) -> Self {
        self.nonce_length = length;
        self
    }

    pub fn store(&self) -> &Arc<VerdictStore> {
        &self.store
    }

    /// The settings as currently saved
    pub async fn settings(&self) -> Result<Settings, crate::store::Error> {
        Settings::load(self.settings.as_ref()).await
    }

    /// Run one check.  An `Err` means the check failed and was recorded as
    /// such; see [`Error::is_retryable`] for whether to try again.
    ///
    /// Dropping the returned future while the token is being requested
    /// leaves the verdict store untouched.
    pub async fn run(&self) -> Result<CheckOutcome, Error> {
        let (previous, settings) = match self.fetch_previous().await {
            Ok(v) => v,
            Err(e) => return self.fail(e, &Settings::default()).await,
        };

        match self.check(&previous).await {
            Ok(outcome) => {
                if let Some(event) = &outcome.change {
                    info!(
                        change = %event.message,
                        improvement = event.is_improvement,
                        "verdicts changed"
                    );
                    if settings.alerts_enabled {
                        self.notify_change(event).await;
                    }
                }

                self.refresh_displays(&outcome.snapshot).await;
                Ok(outcome)
            }
            Err(e) => self.fail(e, &settings).await,
        }
    }

    async fn fetch_previous(&self) -> Result<(Arc<VerdictSnapshot>, Settings), Error> {
        let previous = self.store.read().await?;
        let settings = Settings::load(self.settings.as_ref()).await?;

        Ok((previous, settings))
    }

    async fn check(&self, previous: &VerdictSnapshot) -> Result<CheckOutcome, Error> {
        // configuration problems surface before anything leaves the device
        let keys = self.keys.load()?;

        let nonce = token::nonce::generate(self.nonce_length)?;

        let compact = self
            .issuer
            .request_token(&nonce)
            .await
            .map_err(|e| Error::TokenAcquisition(e.to_string()))?;

        debug!(token = %digest(&compact), "token received");

        let payload = token::unseal(&compact, &keys)?;
        let statement = IntegrityStatement::decode(&payload)?;
        statement.check_nonce(&nonce)?;

        let verdicts = statement.verdicts();
        let snapshot = self.store.record_success(&verdicts).await?;

        info!(
            package = statement.package_name().unwrap_or_default(),
            device = %verdicts.device_tier(),
            "integrity check succeeded"
        );

        Ok(CheckOutcome {
            change: detector::detect(previous, &verdicts),
            snapshot,
            statement,
        })
    }

    async fn fail(&self, e: Error, settings: &Settings) -> Result<CheckOutcome, Error> {
        warn!(error = %e, retryable = e.is_retryable(), "integrity check failed");

        let snapshot = match self.store.record_failure(&e.to_string()).await {
            Ok(s) => s,
            Err(se) => {
                error!(error = %se, "could not record check failure");
                self.store.latest()
            }
        };

        if settings.notify_failures() {
            if let Some(n) = &self.notifier {
                let message = snapshot.error_message.as_deref().unwrap_or_default();
                if let Err(ne) = n.notify_failure(message).await {
                    warn!(error = %ne, "failure notification not delivered");
                }
            }
        }

        self.refresh_displays(&snapshot).await;

        Err(e)
    }

    async fn notify_change(&self, event: &ChangeEvent) {
        if let Some(n) = &self.notifier {
            if let Err(e) = n.notify_change(event).await {
                warn!(error = %e, "change notification not delivered");
            }
        }
    }

    async fn refresh_displays(&self, snapshot: &VerdictSnapshot) {
        for d in &self.displays {
            if let Err(e) = d.refresh(snapshot).await {
                warn!(error = %e, "display refresh failed");
            }
        }
    }
}

// correlates log lines without revealing the token
fn digest(compact: &str) -> String {
    let h = openssl::sha::sha256(compact.as_bytes());
    hex::encode(&h[..8])
}
