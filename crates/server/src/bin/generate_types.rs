use std::{fs, path::PathBuf};

use anyhow::Context;
use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate_types`.\n// Do not edit manually.\n";

    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        db::models::measurement::MeasurementUnit::decl(),
        db::models::measurement::MeasurementValue::decl(),
        db::models::measurement::Measurement::decl(),
        db::models::measurement::CreateMeasurement::decl(),
        db::models::client::Client::decl(),
        db::models::client::CreateClient::decl(),
        db::models::client::UpdateProfileMeasurements::decl(),
        services::services::measurement_diff::Comparison::decl(),
        services::services::measurement_merge::SyncStrategy::decl(),
        services::services::measurement_merge::MergeSource::decl(),
        services::services::measurement_sync::SyncPhase::decl(),
        server::routes::measurements::CreateMeasurementRequest::decl(),
        server::routes::measurements::CompareRequest::decl(),
        server::routes::measurements::ComparisonResponse::decl(),
        server::routes::measurements::SyncRequest::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {decl}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n{body}\n")
}

fn main() -> anyhow::Result<()> {
    let out_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    fs::create_dir_all(&out_dir).context("Failed to create shared/ directory")?;

    let path = out_dir.join("types.ts");
    fs::write(&path, generate_types_content())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Generated TypeScript types in {}", path.display());
    Ok(())
}
