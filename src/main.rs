//! Form Engine demo - drives a sign-up form through the engine
//!
//! Stands in for a rendering collaborator: it feeds scripted keystrokes,
//! waits out the debounce window and prints each state snapshot.

use anyhow::Result;
use form_engine::{
    submit_fn, validator_fn, EngineConfig, FieldMap, FileStorage, FocusTarget, FormEngine,
    MemoryStorage, PersistenceBridge, SnapshotStorage, SubmitOutcome,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Storage key for this form; scoped per form identity
const FORM_KEY: &str = "demo-signup";

struct PrintFocus(&'static str);

impl FocusTarget for PrintFocus {
    fn focus(&self) {
        println!("-> focus moved to '{}'", self.0);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "form_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = EngineConfig::load()?;
    let settle = config.debounce_delay() + Duration::from_millis(50);

    let storage: Arc<dyn SnapshotStorage> = match config.storage_dir() {
        Some(dir) => Arc::new(FileStorage::new(dir)),
        None => Arc::new(MemoryStorage::new()),
    };

    let initial: FieldMap = [("username", ""), ("email", "")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let engine = FormEngine::builder(initial)
        .validator(validator_fn(|values: FieldMap| async move {
            // Simulated remote latency
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut errors = FieldMap::new();
            for (name, value) in values {
                let message = match name.as_str() {
                    "username" if value == "admin" => "Username is already taken.",
                    "username" if value.is_empty() => "Username is required.",
                    "email" if !value.contains('@') => "Invalid email address.",
                    _ => "",
                };
                errors.insert(name, message.to_string());
            }
            Ok::<_, anyhow::Error>(errors)
        }))
        .on_submit(submit_fn(|values: FieldMap| async move {
            let json = serde_json::to_string(&values)?;
            println!("submitted: {json}");
            Ok::<_, anyhow::Error>(())
        }))
        .config(config)
        .persistence(PersistenceBridge::new(storage, FORM_KEY))
        .build()?;

    engine.register_focus_target("username", Arc::new(PrintFocus("username")));
    engine.register_focus_target("email", Arc::new(PrintFocus("email")));
    let mut failures = engine.take_failures();

    print_state("restored", &engine)?;

    type_into(&engine, "username", "admin").await;
    tokio::time::sleep(settle).await;
    type_into(&engine, "email", "x").await;
    tokio::time::sleep(settle).await;
    print_state("after first pass", &engine)?;

    report("first submit", engine.submit().await);

    let username = engine.field("username");
    username.on_change("alice");
    engine.handle_change("email", "alice@example.com");
    tokio::time::sleep(settle).await;
    print_state("after corrections", &engine)?;

    report("second submit", engine.submit().await);
    print_state("after submit", &engine)?;

    if let Some(failures) = failures.as_mut() {
        while let Ok(err) = failures.try_recv() {
            tracing::warn!(error = %err, "engine reported a failure");
        }
    }

    if let Err(err) = engine.persist_now() {
        tracing::warn!(error = %err, "could not persist final values");
    }
    engine.teardown();
    Ok(())
}

/// Feed a value one keystroke at a time, faster than the debounce window
async fn type_into(engine: &FormEngine, name: &str, text: &str) {
    let mut value = String::new();
    for c in text.chars() {
        value.push(c);
        engine.handle_change(name, value.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
}

fn print_state(label: &str, engine: &FormEngine) -> Result<()> {
    let view = engine.view();
    println!(
        "[{label}] pending={} {}",
        view.is_pending,
        serde_json::to_string(&*view.state)?
    );
    Ok(())
}

fn report(label: &str, outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Submitted => println!("{label}: submitted and reset"),
        SubmitOutcome::Invalid { focus } => {
            println!("{label}: invalid, first error in {focus:?}")
        }
        SubmitOutcome::AlreadySubmitting => println!("{label}: already submitting"),
        SubmitOutcome::Failed(err) => println!("{label}: failed ({err})"),
    }
}
