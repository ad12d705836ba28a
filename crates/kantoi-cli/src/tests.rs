use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["kantoi-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["kantoi-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["kantoi-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn ingest_requires_file() {
    assert!(Cli::try_parse_from(["kantoi-cli", "ingest"]).is_err());

    let cli = Cli::try_parse_from(["kantoi-cli", "ingest", "--file", "dump.json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Ingest { ref file }) if file == &PathBuf::from("dump.json")
    ));
}

#[test]
fn score_defaults_to_configured_limit() {
    let cli = Cli::try_parse_from(["kantoi-cli", "score"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Score {
            limit: None,
            dry_run: false
        })
    ));
}

#[test]
fn score_accepts_limit_and_dry_run() {
    let cli =
        Cli::try_parse_from(["kantoi-cli", "score", "--limit", "25", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Score {
            limit: Some(25),
            dry_run: true
        })
    ));
}

#[test]
fn score_rejects_non_numeric_limit() {
    assert!(Cli::try_parse_from(["kantoi-cli", "score", "--limit", "many"]).is_err());
}

#[test]
fn parses_brief_subcommands() {
    let cli = Cli::try_parse_from(["kantoi-cli", "brief", "generate"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Brief {
            command: BriefCommands::Generate
        })
    ));

    let cli = Cli::try_parse_from(["kantoi-cli", "brief", "show"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Brief {
            command: BriefCommands::Show
        })
    ));

    assert!(Cli::try_parse_from(["kantoi-cli", "brief"]).is_err());
}

#[test]
fn report_window_defaults_to_week() {
    let cli = Cli::try_parse_from(["kantoi-cli", "report"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Report { ref window }) if window == "7d"
    ));

    let cli = Cli::try_parse_from(["kantoi-cli", "report", "--window", "24h"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Report { ref window }) if window == "24h"
    ));
}

#[test]
fn parses_status_command() {
    let cli = Cli::try_parse_from(["kantoi-cli", "status"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Status)));
}
