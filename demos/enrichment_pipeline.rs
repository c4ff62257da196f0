//! Enrichment Pipeline
//!
//! This example walks a short app session through the engine and prints the
//! context each event picks up.
//!
//! Key concepts:
//! - Built-in lifecycle, screen, deep link and immersive space machines
//! - A plugin that filters and tags events
//! - Periodic work scheduled on the engine's executor
//!
//! Run with: RUST_LOG=contextflow=debug cargo run --example enrichment_pipeline

use contextflow::event::{
    Background, DeepLinkReceived, DismissImmersiveSpace, Foreground, ImmersionStyle,
    OpenImmersiveSpace, ScreenView, SelfDescribing,
};
use contextflow::{Engine, EngineConfig, Event, Payload, PluginStateMachine, SelfDescribingJson};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn describe(label: &str, event: Option<Event>) {
    let Some(event) = event else {
        println!("{label:<28} (filtered out)");
        return;
    };
    println!("{label:<28} {} entities", event.entities().len());
    for entity in event.entities() {
        let name = entity.schema.split('/').nth(1).unwrap_or(&entity.schema);
        println!("    {name:<24} {}", entity.data);
    }
    if event.payload().contains_key("previousName") {
        println!("    payload                  {}", json!(event.payload()));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Enrichment Pipeline ===\n");

    let engine = Engine::new(EngineConfig::default())?;

    let plugin = PluginStateMachine::builder("app-build")
        .entities(None, |_: &Event| {
            vec![SelfDescribingJson::new(
                "iglu:com.acme/app_build/jsonschema/1-0-0",
                json!({ "build": "2024.10.3" }),
            )]
        })
        .filter(Some(vec!["se".to_string()]), |event: &Event| {
            event.payload().get("category") != Some(&json!("debug"))
        })
        .after_track(None, |event: &Event| {
            tracing::info!(event = event.routing_key(), "tracked");
        });
    engine.add_plugin(plugin)?;

    let heartbeat = engine
        .executor()
        .run_periodically(Duration::from_millis(50), |manager| {
            tracing::debug!(machines = manager.identifiers().count(), "heartbeat");
        })?;

    describe(
        "deep link received",
        engine.track(DeepLinkReceived::new("https://acme.test/sale").into_event())?,
    );
    describe("home screen", engine.track(ScreenView::new("home").into_event())?);
    describe(
        "sale screen",
        engine.track(ScreenView::new("sale").screen_type("feed").into_event())?,
    );

    let mut debug = Payload::new();
    debug.insert("category".into(), json!("debug"));
    describe("debug structured event", engine.track(Event::primitive("se", debug))?);

    describe(
        "open immersive space",
        engine.track(
            OpenImmersiveSpace::new("showroom")
                .immersion_style(ImmersionStyle::Mixed)
                .into_event(),
        )?,
    );
    describe("background", engine.track(Background { index: 1 }.into_event())?);
    describe("foreground", engine.track(Foreground { index: 1 }.into_event())?);
    describe(
        "dismiss immersive space",
        engine.track(DismissImmersiveSpace::new().into_event())?,
    );

    let mut purchase = Payload::new();
    purchase.insert("category".into(), json!("shop"));
    purchase.insert("action".into(), json!("purchase"));
    describe("purchase", engine.track(Event::primitive("se", purchase))?);

    heartbeat.cancel();
    println!("\n=== Example Complete ===");
    Ok(())
}
