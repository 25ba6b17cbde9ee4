use crate::commands::CommandResult;
use devisio_core::config::{AppConfig, LoadOptions};
use devisio_db::{connect_with_settings, migrations, CatalogSeed};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let summary = CatalogSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;

        let verification = CatalogSeed::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;

        if !verification.all_present {
            let failing = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>()
                .join(", ");
            return Err((
                "seed_verification",
                format!("seeded catalog failed verification: {failing}"),
                6u8,
            ));
        }

        Ok::<String, (&'static str, String, u8)>(format!(
            "seeded starter catalog: {} project types, {} design options, {} complexity levels, {} supplementary options",
            summary.project_types,
            summary.design_options,
            summary.complexity_levels,
            summary.options,
        ))
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
