// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

extern crate integrity_watch;

use integrity_watch::check::{FileTokenIssuer, Orchestrator};
use integrity_watch::store::{MemoKeyValueStore, VerdictStore};
use integrity_watch::token::KeyConfig;
use std::fs;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let j = fs::read_to_string("testdata/keys.json").expect("loading testdata/keys.json");
    let keys = KeyConfig::from_json(&j).unwrap();

    let kv = Arc::new(MemoKeyValueStore::new());
    let store = Arc::new(VerdictStore::open(kv.clone()).await.unwrap());

    // the minimal statement carries no nonce, so any fresh nonce is accepted
    let issuer = Arc::new(FileTokenIssuer::new("testdata/token-03-minimal.jwe"));

    let o = Orchestrator::new(store, kv, keys, issuer);

    match o.run().await {
        Ok(outcome) => println!("{}", outcome.snapshot.summary()),
        Err(e) => println!("check failed: {e}"),
    }

    println!("stored: {}", o.store().read().await.unwrap().summary());
}
