mod commands;
mod logging;
mod output;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pipette_core::{DependencyMatching, EvaluationOptions};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pipette",
    version,
    about = "Laboratory report toolkit: test templates, computed results, invoices and stock"
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the template comes from: a JSON file or a built-in preset.
#[derive(Args)]
struct TemplateSource {
    /// Path to a JSON template file
    #[arg(required_unless_present = "preset", conflicts_with = "preset")]
    template: Option<PathBuf>,

    /// Built-in template: lipid, fbc, renal
    #[arg(short, long, value_name = "NAME")]
    preset: Option<String>,
}

#[derive(Args)]
struct InputArgs {
    /// Enter a value: test name or variable, e.g. --set tc=200
    #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    set: Vec<(String, String)>,

    /// JSON object of entered values, applied before --set
    #[arg(long, value_name = "FILE")]
    inputs: Option<PathBuf>,

    /// Decimal places kept for entered and computed numbers
    #[arg(long, default_value_t = 1)]
    decimals: u32,

    /// Match formula variables as whole identifiers instead of substrings
    #[arg(long)]
    token_deps: bool,
}

impl InputArgs {
    fn options(&self) -> EvaluationOptions {
        EvaluationOptions {
            decimal_places: self.decimals,
            dependency_matching: if self.token_deps {
                DependencyMatching::Token
            } else {
                DependencyMatching::Substring
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fill in a template and show entered and computed results
    Evaluate {
        #[command(flatten)]
        source: TemplateSource,

        #[command(flatten)]
        inputs: InputArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Fill in a template and write the finished report as JSON
    Report {
        #[command(flatten)]
        source: TemplateSource,

        #[command(flatten)]
        inputs: InputArgs,

        #[arg(long, value_name = "ID")]
        patient: String,

        #[arg(long, value_name = "ID")]
        invoice: String,

        /// Template id stored on the report (default: the template's short name)
        #[arg(long, value_name = "ID")]
        template_id: Option<String>,

        #[arg(long, default_value = "")]
        comment: String,

        /// Mark the report as a repeat test
        #[arg(long)]
        repeat: bool,

        /// Mark the sample as tested by an outside lab
        #[arg(long)]
        outside: bool,

        /// Write the report to a JSON file (default: stdout)
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Inspect and validate test templates
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },
    /// Update an invoice file
    Invoice {
        #[command(subcommand)]
        action: InvoiceAction,
    },
    /// Stock reports over an inventory file
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
}

#[derive(Subcommand)]
enum TemplatesAction {
    /// List built-in templates
    List,
    /// Show a template's fields, formulas and evaluation order
    Explain {
        /// Preset name (e.g., "lipid") or path to a JSON template
        name: String,

        /// Order and check dependencies with whole-identifier matching
        #[arg(long)]
        token_deps: bool,
    },
    /// Validate a custom template file
    Validate {
        /// Path to JSON template file
        file: PathBuf,

        /// Check dependencies with whole-identifier matching
        #[arg(long)]
        token_deps: bool,
    },
    /// Print the JSON template schema with field descriptions and example
    Schema,
}

#[derive(Subcommand)]
enum InvoiceAction {
    /// Record the total amount paid so far
    Pay {
        /// Invoice JSON file (rewritten in place unless --out is given)
        file: PathBuf,

        #[arg(long)]
        amount: Decimal,

        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Mark an ordered test as completed
    Complete {
        /// Invoice JSON file (rewritten in place unless --out is given)
        file: PathBuf,

        /// Template id of the completed test
        #[arg(long = "template", value_name = "ID")]
        template: String,

        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum InventoryAction {
    /// Items by stock state: inventory, low-stock, expired, expiring
    Report {
        /// JSON array of inventory items
        file: PathBuf,

        #[arg(short, long, default_value = "inventory")]
        kind: String,

        /// Reference date for expiry checks (default: today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Find items by name or code
    Search {
        file: PathBuf,

        query: String,

        /// Only items in this category (e.g. "reagents", "Diagnostic Kits")
        #[arg(short, long)]
        category: Option<String>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Evaluate {
            source,
            inputs,
            output,
        } => commands::evaluate::run(
            source.template,
            source.preset,
            inputs.inputs.as_deref(),
            &inputs.set,
            inputs.options(),
            &output,
        ),
        Commands::Report {
            source,
            inputs,
            patient,
            invoice,
            template_id,
            comment,
            repeat,
            outside,
            out,
        } => commands::report::run(
            commands::report::ReportArgs {
                template: source.template,
                preset: source.preset,
                inputs_file: inputs.inputs.clone(),
                set: inputs.set.clone(),
                patient,
                invoice,
                template_id,
                comment,
                repeat,
                outside,
            },
            inputs.options(),
            out,
        ),
        Commands::Templates { action } => match action {
            TemplatesAction::List => commands::templates::list(),
            TemplatesAction::Explain { name, token_deps } => {
                commands::templates::explain(&name, token_deps)
            }
            TemplatesAction::Validate { file, token_deps } => {
                commands::templates::validate(&file, token_deps)
            }
            TemplatesAction::Schema => commands::templates::schema(),
        },
        Commands::Invoice { action } => match action {
            InvoiceAction::Pay { file, amount, out } => commands::invoice::pay(&file, amount, out),
            InvoiceAction::Complete {
                file,
                template,
                out,
            } => commands::invoice::complete(&file, &template, out),
        },
        Commands::Inventory { action } => match action {
            InventoryAction::Report {
                file,
                kind,
                today,
                output,
            } => commands::inventory::report(&file, &kind, today, &output),
            InventoryAction::Search {
                file,
                query,
                category,
            } => commands::inventory::search(&file, &query, category.as_deref()),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
