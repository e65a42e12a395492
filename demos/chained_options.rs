//! Chained properties driven by an option store.

use prop_kit::{
    error::Result, ArgSelector, ChainedProps, ConfigStore, CountingMetrics, OptMethod, Param,
    PropsClassBuilder, Value,
};
use std::sync::Arc;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== prop-kit - Chained Options ===\n");

    // 1. Declare a class of properties
    println!("1. Building the Report class...");
    let class = PropsClassBuilder::new("Report")
        .property(
            "title",
            vec![Param::required("project"), Param::optional("suffix", "report")],
            |_, args| {
                Ok(Value::from(format!(
                    "{} {}",
                    args.str("project")?,
                    args.str("suffix")?
                )))
            },
        )
        .property("banner", vec![Param::optional("width", 40)], |this, args| {
            let title = this.get("title")?.to_string();
            let width = args.int("width")?.max(0) as usize;
            Ok(Value::from(format!("{:=^width$}", format!(" {} ", title))))
        })
        .method(OptMethod::new(
            "line",
            ArgSelector::Leading(1),
            vec![Param::required("text"), Param::optional("indent", 2)],
            |_, args| {
                let indent = args.int("indent")?.max(0) as usize;
                Ok(Value::from(format!("{}{}", " ".repeat(indent), args.str("text")?)))
            },
        ))
        .build()?;
    println!("   ✓ Class ready\n");

    // 2. Bind it to options
    let opts = ConfigStore::from_pairs([("project", "prop-kit")]);
    let metrics = Arc::new(CountingMetrics::new());
    let report = ChainedProps::with_metrics(&class, &opts, metrics.clone());

    println!("2. First read (computes title and banner):");
    println!("   {}", report.get("banner")?);
    println!("   {}\n", report.call("line", &[Value::from("first line")])?);

    println!("3. Second read (cache hit):");
    println!("   {}\n", report.get("banner")?);

    // 4. Change an option: title and banner are dropped, nothing else
    println!("4. Setting suffix = \"summary\":");
    opts.set("suffix", "summary");
    println!("   banner cached: {}", report.is_cached("banner"));
    println!("   {}\n", report.get("banner")?);

    // 5. Options from the environment, e.g. REPORT_WIDTH=60
    println!("5. Reading REPORT_* environment overrides:");
    opts.set("width", 40);
    let applied = opts.update_from_env("report")?;
    println!("   ✓ {} override(s) applied", applied);
    println!("   {}\n", report.get("banner")?);

    println!(
        "Metrics: {} hits, {} misses, {} invalidations",
        metrics.hits(),
        metrics.misses(),
        metrics.invalidations()
    );
    println!("\n=== Example Complete ===\n");

    Ok(())
}
