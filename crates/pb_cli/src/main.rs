mod cli;
mod commands {
    pub mod client;
    pub mod policy;
    pub mod stats;
    pub mod sync;
}

use clap::Parser;
use cli::{Cli, ClientCmd, Command, PolicyCmd, StatsCmd, SyncCmd};
use pb_core::store::{ClientFields, PolicyFields};
use pb_core::sync::SyncDirection;

fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before unix epoch");
    now.as_millis() as i64
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Client { cmd } => match cmd {
            ClientCmd::Add {
                db_path,
                first_name,
                last_name,
                phone,
            } => commands::client::run_add(
                &db_path,
                ClientFields {
                    first_name,
                    last_name,
                    phone,
                },
                now_ms(),
            ),
            ClientCmd::List { db_path } => commands::client::run_list(&db_path),
            ClientCmd::Edit {
                db_path,
                id,
                first_name,
                last_name,
                phone,
                confirm,
                propagate,
            } => commands::client::run_edit(
                &db_path,
                &id,
                ClientFields {
                    first_name,
                    last_name,
                    phone,
                },
                confirm,
                propagate,
                now_ms(),
            ),
            ClientCmd::Delete { db_path, id } => commands::client::run_delete(&db_path, &id),
        },
        Command::Policy { cmd } => match cmd {
            PolicyCmd::Add {
                db_path,
                policy_no,
                client_phone,
                policy_type,
                date_from,
                date_to,
                endorsement_no,
                premium_rs,
                sum_insured,
                location,
                remarks,
            } => commands::policy::run_add(
                &db_path,
                PolicyFields {
                    policy_no,
                    client_phone,
                    client_name: String::new(),
                    policy_type,
                    date_from,
                    date_to,
                    endorsement_no,
                    premium_rs,
                    sum_insured,
                    location,
                    remarks,
                },
                now_ms(),
            ),
            PolicyCmd::Edit {
                db_path,
                id,
                policy_no,
                client_phone,
                policy_type,
                date_from,
                date_to,
                endorsement_no,
                premium_rs,
                sum_insured,
                location,
                remarks,
            } => commands::policy::run_edit(
                &db_path,
                &id,
                PolicyFields {
                    policy_no,
                    client_phone,
                    client_name: String::new(),
                    policy_type,
                    date_from,
                    date_to,
                    endorsement_no,
                    premium_rs,
                    sum_insured,
                    location,
                    remarks,
                },
                now_ms(),
            ),
            PolicyCmd::List {
                db_path,
                client_phone,
            } => commands::policy::run_list(&db_path, client_phone.as_deref()),
            PolicyCmd::Delete { db_path, id } => commands::policy::run_delete(&db_path, &id),
        },
        Command::Sync { cmd } => match cmd {
            SyncCmd::Startup {
                db_path,
                target,
                owner,
            } => commands::sync::run_startup(&db_path, &target, &owner, now_ms()),
            SyncCmd::Import {
                db_path,
                target,
                owner,
            } => commands::sync::run_manual(&db_path, &target, &owner, SyncDirection::Import, now_ms()),
            SyncCmd::Export {
                db_path,
                target,
                owner,
            } => commands::sync::run_manual(&db_path, &target, &owner, SyncDirection::Export, now_ms()),
            SyncCmd::Info { target, owner } => commands::sync::run_info(&target, &owner),
        },
        Command::Stats { cmd } => match cmd {
            StatsCmd::Summary { db_path, days } => {
                commands::stats::run_summary(&db_path, days, now_ms())
            }
            StatsCmd::Renewals { db_path, days } => {
                commands::stats::run_renewals(&db_path, days, now_ms())
            }
        },
    };

    if let Err(err) = result {
        eprintln!("{}: {}", err.code, err.message);
        std::process::exit(1);
    }
}
