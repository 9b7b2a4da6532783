use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pb_cli")]
#[command(about = "PolicyBook CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Client {
        #[command(subcommand)]
        cmd: ClientCmd,
    },
    Policy {
        #[command(subcommand)]
        cmd: PolicyCmd,
    },
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,
    },
    Stats {
        #[command(subcommand)]
        cmd: StatsCmd,
    },
}

#[derive(Subcommand)]
pub enum ClientCmd {
    Add {
        db_path: String,
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        phone: String,
    },
    List {
        db_path: String,
    },
    Edit {
        db_path: String,
        id: String,
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        propagate: bool,
    },
    Delete {
        db_path: String,
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PolicyCmd {
    Add {
        db_path: String,
        #[arg(long)]
        policy_no: String,
        #[arg(long)]
        client_phone: String,
        #[arg(long, default_value = "General")]
        policy_type: String,
        #[arg(long, default_value = "")]
        date_from: String,
        #[arg(long)]
        date_to: String,
        #[arg(long, default_value = "")]
        endorsement_no: String,
        #[arg(long, default_value_t = 0.0)]
        premium_rs: f64,
        #[arg(long, default_value_t = 0.0)]
        sum_insured: f64,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        remarks: String,
    },
    Edit {
        db_path: String,
        id: String,
        #[arg(long)]
        policy_no: String,
        #[arg(long)]
        client_phone: String,
        #[arg(long, default_value = "General")]
        policy_type: String,
        #[arg(long, default_value = "")]
        date_from: String,
        #[arg(long)]
        date_to: String,
        #[arg(long, default_value = "")]
        endorsement_no: String,
        #[arg(long, default_value_t = 0.0)]
        premium_rs: f64,
        #[arg(long, default_value_t = 0.0)]
        sum_insured: f64,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        remarks: String,
    },
    List {
        db_path: String,
        #[arg(long)]
        client_phone: Option<String>,
    },
    Delete {
        db_path: String,
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCmd {
    Startup {
        db_path: String,
        target: String,
        #[arg(long)]
        owner: String,
    },
    Import {
        db_path: String,
        target: String,
        #[arg(long)]
        owner: String,
    },
    Export {
        db_path: String,
        target: String,
        #[arg(long)]
        owner: String,
    },
    Info {
        target: String,
        #[arg(long)]
        owner: String,
    },
}

#[derive(Subcommand)]
pub enum StatsCmd {
    Summary {
        db_path: String,
        #[arg(long, default_value_t = 30)]
        days: u64,
    },
    Renewals {
        db_path: String,
        #[arg(long, default_value_t = 30)]
        days: u64,
    },
}
