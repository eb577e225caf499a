// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

extern crate integrity_watch;

use integrity_watch::token::{self, IntegrityStatement, KeyConfig};
use std::fs;

fn main() {
    integrity_tokens_decode();
}

fn integrity_tokens_decode() {
    let j = fs::read_to_string("testdata/keys.json").expect("loading testdata/keys.json");
    let keys = KeyConfig::from_json(&j).unwrap().load().unwrap();

    let files = vec!["testdata/token-01.jwe", "testdata/token-03-minimal.jwe"];

    for f in files {
        let compact = fs::read_to_string(f).unwrap_or_else(|_| panic!("loading file {}", f));

        let payload = token::unseal(compact.trim(), &keys).unwrap();
        let statement = IntegrityStatement::decode(&payload).unwrap();

        println!("{}: {:?}", f, statement.verdicts());
    }
}
