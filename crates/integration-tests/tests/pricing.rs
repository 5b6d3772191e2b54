//! Price fan-out: minor units through the exponent table and the rate
//! source into whole satoshis, landing in both stores.

use std::collections::HashMap;
use std::sync::Arc;

use domains::models::{ListingId, PeerId};
use integration_tests::{detail, pipeline, profile, summary, FixedRates, ScriptedGateway};

fn peer(id: &str) -> PeerId {
    PeerId::from(id)
}

fn gateway_with(currency: &str, minor_units: i64) -> ScriptedGateway {
    ScriptedGateway {
        connected: vec![peer("QmVendor")],
        profiles: HashMap::from([(peer("QmVendor"), profile("Walnut Works"))]),
        indexes: HashMap::from([(peer("QmVendor"), vec![summary("QmL1", "Walnut plane")])]),
        details: HashMap::from([(
            (peer("QmVendor"), "QmL1".to_owned()),
            detail(currency, minor_units),
        )]),
        ..ScriptedGateway::default()
    }
}

async fn run(currency: &str, minor_units: i64, rates: FixedRates) -> (Option<i64>, i64) {
    let (discovery, ingest, store, index) =
        pipeline(Arc::new(gateway_with(currency, minor_units)), Arc::new(rates));
    discovery.connected_pass().await;
    ingest.fresh_pass().await;

    let id = ListingId::from("QmL1");
    let doc_price = index.doc(&id).expect("doc").equivalent_btc_price;
    (store.price_of(&id), doc_price)
}

#[tokio::test]
async fn test_fiat_minor_units_become_satoshis_in_both_stores() {
    // 1000 cents = 10 USD; 10 USD * 0.00005 = 0.0005 BTC = 50000 sats.
    let (stored, indexed) = run("USD", 1_000, FixedRates::new(&[("USD", 0.00005)])).await;
    assert_eq!(stored, Some(50_000));
    assert_eq!(indexed, 50_000);
}

#[tokio::test]
async fn test_btc_priced_listing_skips_the_rate_source() {
    // 150000000 sats = 1.5 BTC, converted by identity.
    let (stored, indexed) = run("BTC", 150_000_000, FixedRates::new(&[])).await;
    assert_eq!(stored, Some(150_000_000));
    assert_eq!(indexed, 150_000_000);
}

#[tokio::test]
async fn test_unpriced_listing_is_left_alone() {
    let (stored, indexed) = run("", 0, FixedRates::new(&[])).await;
    assert_eq!(stored, None);
    assert_eq!(indexed, 0);
}

#[tokio::test]
async fn test_unknown_currency_is_left_alone() {
    let (stored, indexed) = run("DOUBLOONS", 900, FixedRates::new(&[])).await;
    assert_eq!(stored, None);
    assert_eq!(indexed, 0);
}

#[tokio::test]
async fn test_rate_outage_skips_pricing_but_not_ingestion() {
    // USD listing but no USD rate scripted: conversion fails.
    let (discovery, ingest, store, index) =
        pipeline(Arc::new(gateway_with("USD", 1_000)), Arc::new(FixedRates::new(&[])));
    discovery.connected_pass().await;
    let stats = ingest.fresh_pass().await;

    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.priced, 0);
    let id = ListingId::from("QmL1");
    assert!(store.listing_ids().contains(&id));
    assert_eq!(store.price_of(&id), None);
    assert!(index.doc(&id).is_some());
}
