use std::{env, env::VarError};

/// There's no real CLI for the server, so any argument prints the help text and the current environment.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets are not listed
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "SETTLE_HOST",
        "SETTLE_PORT",
        "SETTLE_DATABASE_URL",
        "SETTLE_PROCESSOR_FEE_PERCENT",
        "SETTLE_PROCESSOR_FEE_FIXED_CENTS",
        "SETTLE_DEFAULT_MERCHANT_FEE_CENTS",
        "SETTLE_SIGNATURE_TOLERANCE_SECS",
        "SETTLE_DELIVERY_REQUIRE_SIGNATURE",
        "SETTLE_INFLIGHT_WAIT_MS",
        "SETTLE_INFLIGHT_LEASE_SECS",
        "SETTLE_LEDGER_RETENTION_DAYS",
        "SETTLE_PROVIDER_REDELIVERY_DAYS",
        "SETTLE_RETENTION_CHECK_SECS",
        "SETTLE_STRIPE_API_URL",
        "SETTLE_UBER_API_URL",
        "SETTLE_UBER_CUSTOMER_ID",
        "SETTLE_HTTP_CONNECT_TIMEOUT_MS",
        "SETTLE_HTTP_TIMEOUT_MS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
