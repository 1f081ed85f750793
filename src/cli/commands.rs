//! Implementation of the modelcache CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::cache::{self, CacheEntry, CacheKey, CachedModel, Evaluation, ResultCache};
use crate::models::{PowerCurveWindConfig, PowerCurveWindPlant};
use crate::types::config::Config;
use crate::types::values::{value_map_from_json, value_map_to_json, ValueMap};
use crate::{ModelCacheError, ModelCacheResult};

/// Initializes configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> ModelCacheResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    // Create directory if it doesn't exist
    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join("modelcache.toml");

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    let config = Config::default_config();
    config.save(&config_path)?;

    update_gitignore(&target_dir, &config.cache.cache_dir)?;

    println!("modelcache initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!(
        "Cache directory: {} (created on first store)",
        config.cache.cache_dir.display()
    );

    Ok(())
}

/// Updates or creates .gitignore so the cache directory is not committed.
fn update_gitignore(target_dir: &Path, cache_dir: &Path) -> ModelCacheResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let cache_entry = format!("{}/", cache_dir.display());
    let cache_comment = "# modelcache - cached model results";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)?;

        let bare = cache_entry.trim_end_matches('/');
        if content
            .lines()
            .any(|line| line.trim() == cache_entry || line.trim() == bare)
        {
            tracing::debug!(".gitignore already contains {}", cache_entry);
            return Ok(());
        }

        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(cache_comment);
        new_content.push('\n');
        new_content.push_str(&cache_entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)?;
        println!(".gitignore updated with {}", cache_entry);
    } else {
        let content = format!("{}\n{}\n", cache_comment, cache_entry);
        std::fs::write(&gitignore_path, content)?;
        println!(".gitignore created with {}", cache_entry);
    }

    Ok(())
}

fn read_json(path: &Path) -> ModelCacheResult<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ModelCacheError::config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn read_value_map(path: &Path) -> ModelCacheResult<ValueMap> {
    value_map_from_json(read_json(path)?)
}

/// Prints the cache key of a configuration and its inputs.
pub async fn key(
    model_config: &Path,
    inputs: &Path,
    discrete: Option<&Path>,
) -> ModelCacheResult<()> {
    let config = read_json(model_config)?;
    let inputs = read_value_map(inputs)?;
    let discrete_inputs = match discrete {
        Some(path) => read_value_map(path)?,
        None => ValueMap::new(),
    };

    let key = cache::compute_key(&config, &inputs, &discrete_inputs)?;
    println!("{}", key);
    Ok(())
}

/// Prints the entry stored under a key.
pub async fn show(key: &str, config: &Config) -> ModelCacheResult<()> {
    let key: CacheKey = key.parse()?;
    let cache_dir = &config.cache.cache_dir;

    match cache::try_load(cache_dir, &key)? {
        Some(entry) => {
            println!("{}", serde_json::to_string_pretty(&entry_json(&entry))?);
        }
        None => {
            println!(
                "No entry for {} in {}",
                key,
                cache_dir.display()
            );
        }
    }
    Ok(())
}

fn entry_json(entry: &CacheEntry) -> serde_json::Value {
    serde_json::json!({
        "outputs": value_map_to_json(&entry.outputs),
        "discrete_outputs": value_map_to_json(&entry.discrete_outputs),
    })
}

/// Lists the entries of the cache directory.
pub async fn list(config: &Config) -> ModelCacheResult<()> {
    let cache_dir = &config.cache.cache_dir;
    let entries = cache::list_entries(cache_dir)?;

    if entries.is_empty() {
        println!("No cache entries in {}", cache_dir.display());
        return Ok(());
    }

    println!("Cache entries in {}:\n", cache_dir.display());
    let mut total_bytes = 0;
    for entry in &entries {
        total_bytes += entry.size_bytes;
        let modified = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {}  {:>10} B  {}", entry.key, entry.size_bytes, modified);
    }
    println!("\n{} entries, {} bytes", entries.len(), total_bytes);

    Ok(())
}

/// Checks every entry of the cache directory.
pub async fn verify(config: &Config) -> ModelCacheResult<()> {
    let cache_dir = &config.cache.cache_dir;
    println!("Verifying {}...\n", cache_dir.display());

    let report = cache::verify_dir(cache_dir)?;
    println!("✓ {} valid entries", report.valid.len());

    if report.is_clean() {
        return Ok(());
    }

    for corrupt in &report.corrupt {
        println!("✗ {}: {}", corrupt.path.display(), corrupt.reason);
    }
    Err(ModelCacheError::other(format!(
        "{} corrupt cache entries in {}",
        report.corrupt.len(),
        cache_dir.display()
    )))
}

/// Loads the wind model; the `[cache]` section of the configuration wins
/// over any cache fields in the model file.
fn load_wind_model(path: &Path, config: &Config) -> ModelCacheResult<PowerCurveWindPlant> {
    let mut model_config = PowerCurveWindConfig::load(path)?;
    model_config.cache = config.cache.clone();
    PowerCurveWindPlant::new(model_config)
}

fn scalar(entry: &CacheEntry, name: &str) -> f64 {
    entry
        .outputs
        .get(name)
        .and_then(|v| v.as_f64())
        .unwrap_or(f64::NAN)
}

fn print_summary(label: &str, eval: &Evaluation) {
    let key = eval
        .key
        .as_ref()
        .map(|k| k.as_str()[..12].to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {}: {} [{}] energy={:.1} kWh cf={:.4}",
        label,
        eval.outcome,
        key,
        scalar(&eval.entry, "total_electricity_produced"),
        scalar(&eval.entry, "capacity_factor"),
    );
}

/// Evaluates the wind model once through the cache.
pub async fn run(model_path: &Path, wind_speed: &Path, config: &Config) -> ModelCacheResult<()> {
    let model = load_wind_model(model_path, config)?;
    let wind_speed: Vec<f64> = serde_json::from_value(read_json(wind_speed)?)?;
    let cache = ResultCache::for_model(&model);

    let inputs = PowerCurveWindPlant::inputs(wind_speed);
    let eval = cache.evaluate(&model, &inputs, &ValueMap::new())?;

    tracing::info!(model = model.name(), outcome = %eval.outcome, "evaluation finished");
    print_summary("result", &eval);
    println!("{}", serde_json::to_string_pretty(&entry_json(&eval.entry))?);

    Ok(())
}

/// Evaluates the wind model for every case, at most `jobs` at a time.
///
/// All cases share one cache directory; identical cases computed at the
/// same time are simply computed twice.
pub async fn sweep(
    model_path: &Path,
    cases_path: &Path,
    jobs: usize,
    config: &Config,
) -> ModelCacheResult<()> {
    let model = Arc::new(load_wind_model(model_path, config)?);
    let cases: Vec<Vec<f64>> = serde_json::from_value(read_json(cases_path)?)?;
    let cache = Arc::new(ResultCache::for_model(&*model));
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));

    println!("Running {} cases...\n", cases.len());

    let mut handles = Vec::with_capacity(cases.len());
    for (index, wind_speed) in cases.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ModelCacheError::other(e.to_string()))?;
        let model = Arc::clone(&model);
        let cache = Arc::clone(&cache);

        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let inputs = PowerCurveWindPlant::inputs(wind_speed);
            cache
                .evaluate(&*model, &inputs, &ValueMap::new())
                .map(|eval| (index, eval))
        }));
    }

    for handle in handles {
        let (index, eval) = handle
            .await
            .map_err(|e| ModelCacheError::other(format!("sweep task failed: {}", e)))??;
        print_summary(&format!("case {}", index), &eval);
    }

    let stats = cache.stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        stores = stats.stores,
        "sweep finished"
    );
    println!(
        "\n{} hits, {} misses, {} stored, hit rate {:.1}%",
        stats.hits,
        stats.misses,
        stats.stores,
        stats.hit_rate() * 100.0
    );
    if stats.store_failures > 0 {
        println!("{} results could not be stored", stats.store_failures);
    }

    Ok(())
}

/// Shows the version.
pub fn version() {
    println!("modelcache {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration-keyed disk cache for plant sub-models");
}
