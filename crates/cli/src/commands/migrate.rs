use crate::commands::{async_runtime, load_config, CommandResult};
use taskpilot_knowledge::factory::MEMORY_STORE_URL;
use taskpilot_knowledge::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let knowledge = &config.knowledge;
    if knowledge.store_url.trim() == MEMORY_STORE_URL {
        return CommandResult::success("migrate", "in-memory vector store needs no migrations");
    }

    let runtime = match async_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &knowledge.store_url,
            knowledge.max_connections,
            knowledge.timeout_secs,
        )
        .await
        .map_err(|error| ("store_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending vector store migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
