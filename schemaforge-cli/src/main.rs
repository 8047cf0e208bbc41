use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use schemaforge_cli::config::{self, ConfigMerger};
use schemaforge_cli::listing;
use schemaforge_cli::prompt::StdinPrompt;
use schemaforge_core::adapters::{
    FsConfigStore, FsProject, FsResourceStatus, FsWritePort, NoopApplier, Sha256DirectoryHasher,
    TomlFeatureFlagStore, UnavailableAlternateCompiler,
};
use schemaforge_core::ports::ProjectPort;
use schemaforge_core::{
    CompileError, CompileOutcome, CompilePorts, CompileSettings, CompileStatus, CompiledApi,
    ManifestModuleLoader, SkipReason, directive_definitions, run_compile,
};
use schemaforge_plugins::BUILTIN_CATALOG;
use schemaforge_plugins::catalog::lookup;
use schemaforge_types::project::API_CATEGORY;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "schemaforge",
    version,
    about = "Compiles annotated API schemas into deployable infrastructure artifacts."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile the project's API schema (migrating legacy projects first).
    Compile(CompileArgs),
    /// Print every directive definition available to the project's schemas.
    Directives(DirectivesArgs),
    /// List built-in transformers and the custom transformers the project configures.
    ListPlugins(ListPluginsArgs),
    /// Describe one built-in transformer: its directive, stage and when it runs.
    Explain(ExplainArgs),
}

#[derive(Debug, Parser)]
struct CompileArgs {
    /// Project root (default: current directory).
    #[arg(long, env = "SCHEMAFORGE_PROJECT_ROOT", default_value = ".")]
    project_root: Utf8PathBuf,

    /// Compile only this API resource.
    #[arg(long)]
    api: Option<String>,

    /// Compile even when nothing changed since the last build.
    #[arg(long, default_value_t = false)]
    force_compile: bool,

    /// Run every check but write nothing.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Migrate a legacy project without asking.
    #[arg(long, default_value_t = false)]
    migrate: bool,

    /// Answer yes to every confirmation.
    #[arg(long, short = 'y', default_value_t = false)]
    yes: bool,

    /// Allow updates that destroy deployed data (tables, key schemas, fields).
    #[arg(
        long = "allow-destructive-graphql-schema-updates",
        visible_alias = "force",
        default_value_t = false
    )]
    allow_destructive: bool,

    /// Skip the compile entirely.
    #[arg(long, default_value_t = false)]
    no_gql_override: bool,

    /// Write the template without whitespace.
    #[arg(long, default_value_t = false)]
    minify: bool,

    /// Directory of globally installed transformer packages.
    #[arg(long, env = "SCHEMAFORGE_GLOBAL_PLUGIN_ROOT")]
    global_plugin_root: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct DirectivesArgs {
    /// Project root (default: current directory).
    #[arg(long, env = "SCHEMAFORGE_PROJECT_ROOT", default_value = ".")]
    project_root: Utf8PathBuf,

    /// Include the custom transformers configured for this API resource.
    #[arg(long)]
    api: Option<String>,
}

#[derive(Debug, Parser)]
struct ListPluginsArgs {
    /// Project root (default: current directory).
    #[arg(long, env = "SCHEMAFORGE_PROJECT_ROOT", default_value = ".")]
    project_root: Utf8PathBuf,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct ExplainArgs {
    /// Transformer key to explain (e.g., "model", "auth").
    key: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        error!("{:#}", e);
        let code = e
            .downcast_ref::<CompileError>()
            .map(CompileError::exit_code)
            .unwrap_or(1);
        return ExitCode::from(code as u8);
    }
    ExitCode::SUCCESS
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compile(args) => cmd_compile(args),
        Command::Directives(args) => cmd_directives(args),
        Command::ListPlugins(args) => cmd_list_plugins(args),
        Command::Explain(args) => cmd_explain(args),
    }
}

/// Filesystem-backed ports for one command.
struct FsPorts {
    project: FsProject,
    status: FsResourceStatus,
    flags: TomlFeatureFlagStore,
    loader: ManifestModuleLoader,
}

impl FsPorts {
    fn new(project_root: &Utf8Path) -> Self {
        let project = FsProject::new(project_root.to_path_buf());
        let status = FsResourceStatus::for_project(&project);
        Self {
            project,
            status,
            flags: TomlFeatureFlagStore::for_project(project_root),
            loader: ManifestModuleLoader::new(),
        }
    }

    fn ports(&self) -> CompilePorts<'_> {
        CompilePorts {
            project: &self.project,
            status: &self.status,
            config_store: &FsConfigStore,
            flags_store: &self.flags,
            prompt: &StdinPrompt,
            applier: &NoopApplier,
            alternate: &UnavailableAlternateCompiler,
            loader: &self.loader,
            hasher: &Sha256DirectoryHasher,
            writer: &FsWritePort,
        }
    }
}

fn load_settings(
    project_root: Utf8PathBuf,
    minify: bool,
    allow_destructive: bool,
    global_plugin_root: Option<Utf8PathBuf>,
) -> anyhow::Result<CompileSettings> {
    let file_config =
        config::load_or_default(&project_root).context("load schemaforge.toml config")?;
    let merged = ConfigMerger::new(file_config).merge_compile_args(
        minify,
        allow_destructive,
        global_plugin_root,
    );
    debug!("merged config: {:?}", merged);

    Ok(CompileSettings {
        project_root,
        minify: merged.minify,
        allow_destructive_updates: merged.allow_destructive_updates,
        global_plugin_root: merged.global_plugin_root,
        flags: merged.flags,
        ..Default::default()
    })
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<()> {
    let base = load_settings(
        args.project_root,
        args.minify,
        args.allow_destructive,
        args.global_plugin_root,
    )?;
    let settings = CompileSettings {
        api_name: args.api,
        force_compile: args.force_compile,
        no_gql_override: args.no_gql_override,
        dry_run: args.dry_run,
        migrate: args.migrate,
        yes: args.yes,
        ..base
    };

    let fs_ports = FsPorts::new(&settings.project_root);
    let outcome = run_compile(&settings, &fs_ports.ports())?;
    print_outcome(&outcome, settings.dry_run);
    Ok(())
}

fn print_outcome(outcome: &CompileOutcome, dry_run: bool) {
    match &outcome.status {
        CompileStatus::Skipped(reason) => {
            let why = match reason {
                SkipReason::GqlOverrideDisabled => "compilation disabled by --no-gql-override",
                SkipReason::NoApiToCompile => "no API changed since the last build",
                SkipReason::MigrationRequired => "the API must be migrated first",
            };
            println!("Nothing to compile: {}", why);
        }
        CompileStatus::Delegated(version) => {
            println!(
                "Compiled with transformer version {}",
                version.as_number()
            );
        }
        CompileStatus::Migrated { report, api } => {
            println!("Migrated API {}: {}", api.resource_name, report.apply);
            print_api(api, dry_run);
        }
        CompileStatus::Compiled(api) => print_api(api, dry_run),
    }
    if !outcome.warnings.is_empty() {
        println!("{} warning(s) reported", outcome.warnings.len());
    }
}

fn print_api(api: &CompiledApi, dry_run: bool) {
    println!(
        "Compiled API {} ({} transformers, {} resources, {} resolvers)",
        api.resource_name,
        api.transformers.len(),
        api.fragments.resources.len(),
        api.fragments.resolvers.len()
    );
    println!("Deployment key: {}", api.deployment_key);
    if dry_run {
        println!("Dry run: no files written");
    } else {
        println!("Build output: {}", api.resource_dir.join("build"));
    }
}

fn cmd_directives(args: DirectivesArgs) -> anyhow::Result<()> {
    let settings = load_settings(args.project_root, false, false, None)?;
    let fs_ports = FsPorts::new(&settings.project_root);
    let resource_dir = args.api.map(|name| {
        fs_ports
            .project
            .backend_dir()
            .join(API_CATEGORY)
            .join(name)
    });
    let sdl = directive_definitions(&settings, &fs_ports.ports(), resource_dir.as_deref())?;
    println!("{}", sdl);
    Ok(())
}

fn cmd_list_plugins(args: ListPluginsArgs) -> anyhow::Result<()> {
    let project = FsProject::new(args.project_root);
    let api_dir = project.backend_dir().join(API_CATEGORY);
    let plugins = listing::collect(&api_dir, &FsConfigStore)?;

    match args.format {
        OutputFormat::Text => {
            print!("{}", listing::render_text(&plugins));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plugins)?);
        }
    }
    Ok(())
}

fn cmd_explain(args: ExplainArgs) -> anyhow::Result<()> {
    let Some(transformer) = lookup(&args.key) else {
        let available: Vec<_> = BUILTIN_CATALOG.iter().map(|t| t.key).collect();
        anyhow::bail!(
            "Unknown transformer key: '{}'\n\nAvailable transformers: {}",
            args.key,
            available.join(", ")
        );
    };
    print!("{}", listing::render_explanation(transformer));
    Ok(())
}
