//! End-to-end update cost: state write, subscriber delivery and watched
//! selector re-evaluation.

use crate::report::Report;
use crate::utils::*;
use tessera_context::{AppStateContext, TesseraConfig};
use tessera_core::{Result, Value};

pub fn run(report: &mut Report) -> Result<()> {
    println!("  Update With Watched Selectors:");

    for &size in &SIZES {
        let context = AppStateContext::with_state(TesseraConfig::default(), document_state(size));
        let factory = context.selectors();
        let elements = factory.create_path_selector("elements", Value::Array(Vec::new()), None)?;
        let texts = factory.create_filter_selector(
            elements.shared(),
            |e| Ok(is_validated_text(e)),
            Some("validated_texts"),
        )?;
        let count = factory.create_aggregation_selector(
            texts.shared(),
            |items| Ok(Value::from(items.len())),
            Some("validated_text_count"),
        )?;
        context.watch_selector(count.shared(), |_| {})?;
        context.subscriptions().subscribe_to_deep_path("ui", |_| {});

        let mut zoom = 1;
        let mut failure = None;
        let result = measure(ITERATIONS / 10, || {
            zoom += 1;
            if let Err(err) = context.update("ui.zoom", Value::from(zoom)) {
                failure = Some(err);
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }

        print_line(&format!("{size} elements"), &result, None);
        report.add_result("Context", "update", Some(size), result, None);
    }
    Ok(())
}
