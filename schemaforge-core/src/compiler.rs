//! The compile pipeline, extracted from the CLI.
//!
//! Entry points here are I/O-agnostic: every read of project state and
//! every write goes through the port traits bundled in [`CompilePorts`].

use crate::build_cache::deployment_key;
use crate::error::{CompileError, MigrationError};
use crate::migration::{MigrationCoordinator, MigrationReport, is_legacy_project};
use crate::ports::{
    AlternateCompiler, ConfigStore, DirectoryHasher, FeatureFlagStore, ProjectPort, Prompt,
    RemoteApplier, ResourceStatusPort, WritePort,
};
use crate::sanity::{BuildArtifacts, SanityViolation, select_rules};
use crate::settings::CompileSettings;
use crate::version_gate::resolve_version;
use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use schemaforge_plugin_api::FragmentSet;
use schemaforge_plugins::{
    ModuleLoader, PipelineInputs, PluginResolver, PluginRoots, SERVICE_DIRECTIVES, build_pipeline,
};
use schemaforge_schema::{
    DirectiveUsageMap, Schema, collect_directives_by_type, parse_schema, read_project_schema,
    schema_sources,
};
use schemaforge_types::files::{
    BUILD_DIR_NAME, CLOUDFORMATION_FILE_NAME, PARAMETERS_FILE_NAME, RESOLVERS_DIR_NAME,
    SCHEMA_DIR_NAME, SCHEMA_FILE_NAME, TRANSFORM_CONFIG_FILE_NAME,
};
use schemaforge_types::project::{API_CATEGORY, PROVIDER_NAME};
use schemaforge_types::{
    ApiResource, AuthConfig, BuildParameters, CompilerVersion, DeploymentKey, ResourceStatus,
    TransformerConfig,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Bucket name used in place of the real deployment bucket on dry runs.
pub const DRY_RUN_BUCKET: &str = "fake-bucket";

const DEFAULT_SECURITY_TYPE: &str = "API_KEY";
const DEFAULT_SEARCH_INSTANCE_TYPE: &str = "t2.small.elasticsearch";
const SMALL_SEARCH_INSTANCE_PREFIXES: [&str; 2] = ["t2.small", "t3.small"];

const MIGRATION_PROMPT: &str = "Your API was built with an older layout and must be migrated. The migration updates the deployed stack in place; rollback is automatic if it fails. Do you want to migrate now?";
const CONTINUE_PROMPT: &str = "Do you wish to continue?";
const AUTH_DEFAULT_CHANGED: &str = "The default behavior for @auth has changed: owner-based rules no longer grant access to other authorization modes, and field-level @auth now restricts reads on the whole type. Review your @auth rules before deploying.";
const SEARCH_DEFAULT_CHANGED: &str = "The behavior for @searchable has changed: search indexes are now updated only for records written after this deployment. Existing data must be re-indexed.";

/// All ports used by [`run_compile`].
#[derive(Clone, Copy)]
pub struct CompilePorts<'a> {
    pub project: &'a dyn ProjectPort,
    pub status: &'a dyn ResourceStatusPort,
    pub config_store: &'a dyn ConfigStore,
    pub flags_store: &'a dyn FeatureFlagStore,
    pub prompt: &'a dyn Prompt,
    pub applier: &'a dyn RemoteApplier,
    pub alternate: &'a dyn AlternateCompiler,
    pub loader: &'a dyn ModuleLoader,
    pub hasher: &'a dyn DirectoryHasher,
    pub writer: &'a dyn WritePort,
}

/// Why a compile did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The caller disabled compilation with `--no-gql-override`.
    GqlOverrideDisabled,
    /// No API resource needs compiling.
    NoApiToCompile,
    /// The project must be migrated, which a dry run never does.
    MigrationRequired,
}

/// Result of compiling one API resource.
#[derive(Debug, Clone)]
pub struct CompiledApi {
    pub resource_name: String,
    pub resource_dir: Utf8PathBuf,
    pub deployment_key: DeploymentKey,
    /// Project parameters as read or supplied.
    pub parameters: BuildParameters,
    /// Project parameters plus the deployment bucket and root key.
    pub build_parameters: BuildParameters,
    pub fragments: FragmentSet,
    /// Output schema: the input schema followed by every generated addition.
    pub schema_sdl: String,
    /// Transformer names, in run order.
    pub transformers: Vec<String>,
    pub sanity_warnings: Vec<SanityViolation>,
}

#[derive(Debug, Clone)]
pub enum CompileStatus {
    Skipped(SkipReason),
    /// The project is on a version handled by the alternate compiler.
    Delegated(CompilerVersion),
    Migrated {
        report: MigrationReport,
        api: Box<CompiledApi>,
    },
    Compiled(Box<CompiledApi>),
}

/// Outcome of [`run_compile`].
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub status: CompileStatus,
    /// Every user-facing warning emitted along the way, in order.
    pub warnings: Vec<String>,
}

impl CompileOutcome {
    /// The compiled API, whether built directly or as part of a migration.
    pub fn compiled(&self) -> Option<&CompiledApi> {
        match &self.status {
            CompileStatus::Compiled(api) | CompileStatus::Migrated { api, .. } => Some(api),
            _ => None,
        }
    }
}

/// Everything fixed about the resource before its compile starts.
struct CompileJob<'r> {
    resource: &'r ApiResource,
    status: &'r ResourceStatus,
    resource_dir: Utf8PathBuf,
    /// Where the previous build is read from. The deployed copy, except during
    /// a migration rebuild.
    previous_dir: Utf8PathBuf,
    /// The deployed copy, used for its recorded transformer config.
    cloud_resource_dir: Utf8PathBuf,
    parameters: BuildParameters,
}

/// Compile the project's API schema.
///
/// Files are written only on a successful, non-dry-run compile. The caller
/// owns rendering of the returned outcome.
pub fn run_compile(
    settings: &CompileSettings,
    ports: &CompilePorts<'_>,
) -> Result<CompileOutcome, CompileError> {
    let mut warnings = Vec::new();
    if settings.no_gql_override {
        info!("Skipping GraphQL compile (--no-gql-override)");
        return Ok(CompileOutcome {
            status: CompileStatus::Skipped(SkipReason::GqlOverrideDisabled),
            warnings,
        });
    }

    let backend_dir = ports.project.backend_dir();
    let cloud_dir = ports.project.cloud_backend_dir();
    let status = ports
        .status
        .resource_status(API_CATEGORY)
        .context("read API resource status")?;
    let Some(resource) = select_resource(settings, &status, &backend_dir) else {
        info!("No GraphQL API to compile");
        return Ok(CompileOutcome {
            status: CompileStatus::Skipped(SkipReason::NoApiToCompile),
            warnings,
        });
    };

    let resource_dir = backend_dir.join(API_CATEGORY).join(&resource.resource_name);
    let cloud_resource_dir = cloud_dir.join(API_CATEGORY).join(&resource.resource_name);
    debug!(resource = %resource.resource_name, dir = %resource_dir, "compiling API");

    let local_config = ports.config_store.read(&resource_dir)?;
    let flags_store = (!settings.dry_run).then_some(ports.flags_store);
    let decision = resolve_version(&settings.flags, local_config.as_ref(), flags_store)?;
    if let Some(message) = decision.forward_migration_warning {
        warnings.push(message);
        if !settings.dry_run {
            let mut config = local_config.unwrap_or_default();
            let target = decision.version.as_number() as u32;
            if config.advance_version(target).map_err(anyhow::Error::from)? {
                ports.config_store.write(&resource_dir, &config)?;
            }
        }
    }
    if decision.version != CompilerVersion::V1 {
        info!(version = decision.version.as_number(), "delegating to the alternate compiler");
        ports.alternate.compile(ports.project.project_root())?;
        return Ok(CompileOutcome {
            status: CompileStatus::Delegated(decision.version),
            warnings,
        });
    }

    let parameters = match &settings.parameters {
        Some(parameters) => parameters.clone(),
        None => read_parameters(&resource_dir),
    };
    let job = CompileJob {
        resource: &resource,
        status: &status,
        resource_dir: resource_dir.clone(),
        previous_dir: cloud_resource_dir.clone(),
        cloud_resource_dir: cloud_resource_dir.clone(),
        parameters,
    };

    if is_legacy_project(&cloud_resource_dir, status.has_new_api()) {
        if settings.dry_run {
            let message = format!(
                "API {} must be migrated before it can be compiled; dry runs never migrate",
                resource.resource_name
            );
            warn!("{}", message);
            warnings.push(message);
            return Ok(CompileOutcome {
                status: CompileStatus::Skipped(SkipReason::MigrationRequired),
                warnings,
            });
        }
        let confirmed =
            settings.migrate || settings.yes || ports.prompt.confirm(MIGRATION_PROMPT, true)?;
        if !confirmed {
            return Err(MigrationError::Cancelled.into());
        }

        let mut coordinator = MigrationCoordinator::new(
            &resource.resource_name,
            &resource_dir,
            &cloud_resource_dir,
            settings.migrate,
            ports.applier,
            ports.config_store,
        );
        let mut rebuilt = None;
        let report = coordinator.run(|previous_dir| {
            let job = CompileJob {
                resource: job.resource,
                status: job.status,
                resource_dir: job.resource_dir.clone(),
                previous_dir: previous_dir.to_path_buf(),
                cloud_resource_dir: job.cloud_resource_dir.clone(),
                parameters: job.parameters.clone(),
            };
            rebuilt = Some(compile_resource(settings, ports, &job, &mut warnings)?);
            Ok(())
        })?;
        let api = rebuilt.ok_or_else(|| anyhow!("migration finished without rebuilding the API"))?;
        return Ok(CompileOutcome {
            status: CompileStatus::Migrated {
                report,
                api: Box::new(api),
            },
            warnings,
        });
    }

    let api = compile_resource(settings, ports, &job, &mut warnings)?;
    Ok(CompileOutcome {
        status: CompileStatus::Compiled(Box::new(api)),
        warnings,
    })
}

/// The API resource to compile: new, changed, never built, or (with
/// `--force-compile`) any.
fn select_resource(
    settings: &CompileSettings,
    status: &ResourceStatus,
    backend_dir: &Utf8Path,
) -> Option<ApiResource> {
    let api_dir = backend_dir.join(API_CATEGORY);
    let unbuilt = status
        .all
        .iter()
        .filter(|r| !api_dir.join(&r.resource_name).join(BUILD_DIR_NAME).is_dir());
    let forced = status.all.iter().filter(|_| settings.force_compile);

    status
        .to_create
        .iter()
        .chain(status.to_update.iter())
        .chain(unbuilt)
        .chain(forced)
        .filter(|r| r.is_api() && r.provider_plugin == PROVIDER_NAME)
        .find(|r| {
            settings
                .api_name
                .as_deref()
                .is_none_or(|name| name == r.resource_name)
        })
        .cloned()
}

/// `<resource>/parameters.json`, or empty parameters when it is missing or unreadable.
fn read_parameters(resource_dir: &Utf8Path) -> BuildParameters {
    let path = resource_dir.join(PARAMETERS_FILE_NAME);
    let Ok(text) = fs_err::read_to_string(&path) else {
        return BuildParameters::new();
    };
    serde_json::from_str(&text).unwrap_or_else(|err| {
        warn!(path = %path, error = %err, "ignoring unreadable parameters");
        BuildParameters::new()
    })
}

fn compile_resource(
    settings: &CompileSettings,
    ports: &CompilePorts<'_>,
    job: &CompileJob<'_>,
    warnings: &mut Vec<String>,
) -> Result<CompiledApi, CompileError> {
    let resource_dir = &job.resource_dir;
    let auth_config = settings
        .auth_config
        .clone()
        .or_else(|| job.resource.recorded_auth_config())
        .unwrap_or_else(|| AuthConfig::from_security_type(DEFAULT_SECURITY_TYPE));
    let storage = ports.project.storage_config()?;
    let admin_mode = ports.project.is_admin_app().unwrap_or_else(|err| {
        debug!(error = %format!("{:#}", err), "admin mode unavailable, assuming off");
        false
    });

    let key = deployment_key(resource_dir, Some(&job.previous_dir), ports.hasher)?;
    let bucket = if settings.dry_run {
        DRY_RUN_BUCKET.to_string()
    } else {
        ports.project.deployment_bucket()?
    };
    let build_parameters = job.parameters.with_deployment(&bucket, &key);

    let schema = read_schema(resource_dir)?;
    let usage = collect_directives_by_type(&schema);
    warn_on_schema(&usage, &build_parameters, warnings);
    let config = check_schema_changes(settings, ports, job, &usage, warnings)?;
    if !settings.dry_run {
        ports.writer.create_dir_all(&resource_dir.join(BUILD_DIR_NAME))?;
    }

    let roots = PluginRoots::for_project(
        ports.project.project_root(),
        settings.global_plugin_root.clone(),
    );
    let config_path = resource_dir.join(TRANSFORM_CONFIG_FILE_NAME);
    let custom = PluginResolver::new(ports.loader, roots, &config_path)
        .resolve_all(&config.transformers)?;

    let pipeline = build_pipeline(PipelineInputs {
        include_search_capability: usage.uses("searchable"),
        storage,
        custom,
        auth_config,
        admin_mode,
    });
    let rules = select_rules(
        job.status.has_new_api(),
        settings.flags.enable_iterative_gsi_updates,
        settings.allow_destructive_updates,
    );
    debug!(transformers = ?pipeline.names(), rules = ?rules.names(), "pipeline ready");

    let fragments = pipeline.run(&schema)?;
    let schema_sdl = output_schema(&schema, &fragments);

    let current = BuildArtifacts::new(fragments.to_template(), parse_schema(&schema_sdl).ok());
    let previous = BuildArtifacts::read(&job.previous_dir).unwrap_or_else(|err| {
        warn!(error = %format!("{:#}", err), "previous build is unreadable, skipping diff checks");
        None
    });
    let sanity_warnings = rules
        .check(previous.as_ref(), &current)
        .map_err(CompileError::SanityCheck)?;
    warnings.extend(sanity_warnings.iter().map(|v| v.message.clone()));

    let api = CompiledApi {
        resource_name: job.resource.resource_name.clone(),
        resource_dir: resource_dir.clone(),
        deployment_key: key,
        parameters: job.parameters.clone(),
        build_parameters,
        fragments,
        schema_sdl,
        transformers: pipeline.names().into_iter().map(str::to_string).collect(),
        sanity_warnings,
    };
    if !settings.dry_run {
        write_build_outputs(&api, settings.minify, ports.writer)?;
    }

    info!(
        "GraphQL schema compiled successfully.\n\nEdit your schema at {} or place .graphql files in a directory at {}",
        resource_dir.join(SCHEMA_FILE_NAME),
        resource_dir.join(SCHEMA_DIR_NAME)
    );
    Ok(api)
}

fn read_schema(resource_dir: &Utf8Path) -> Result<Schema, CompileError> {
    let sources = schema_sources(resource_dir)?;
    let path = match sources.as_slice() {
        [single] => single.clone(),
        _ => resource_dir.join(SCHEMA_DIR_NAME),
    };
    let sdl = read_project_schema(resource_dir)?;
    parse_schema(&sdl).map_err(|source| CompileError::Parse { path, source })
}

fn warn_on_schema(usage: &DirectiveUsageMap, params: &BuildParameters, warnings: &mut Vec<String>) {
    let unauthenticated = usage.unauthenticated_models();
    if !unauthenticated.is_empty() {
        let message = format!(
            "The following types do not have '@auth' enabled. Consider using @auth with @model\n\t - {}",
            unauthenticated.join("\n\t - ")
        );
        warn!("{}", message);
        warnings.push(message);
    }

    if !usage.searchable_models().is_empty() {
        let instance_type = params
            .get_str(BuildParameters::SEARCH_INSTANCE_TYPE)
            .unwrap_or(DEFAULT_SEARCH_INSTANCE_TYPE);
        if SMALL_SEARCH_INSTANCE_PREFIXES
            .iter()
            .any(|prefix| instance_type.starts_with(prefix))
        {
            let message = format!(
                "Your instance type for search is {}, you may experience performance issues or data loss. Set {} in parameters.json to a larger instance type.",
                instance_type,
                BuildParameters::SEARCH_INSTANCE_TYPE
            );
            warn!("{}", message);
            warnings.push(message);
        }
    }
}

/// Warn about default behavior changes the first time an existing API is
/// compiled, then record that the warnings were shown.
fn check_schema_changes(
    settings: &CompileSettings,
    ports: &CompilePorts<'_>,
    job: &CompileJob<'_>,
    usage: &DirectiveUsageMap,
    warnings: &mut Vec<String>,
) -> Result<TransformerConfig, CompileError> {
    let mut local = ports
        .config_store
        .read(&job.resource_dir)?
        .unwrap_or_default();
    let deployed = ports
        .config_store
        .read(&job.cloud_resource_dir)
        .unwrap_or_else(|err| {
            debug!(error = %format!("{:#}", err), "deployed transformer config unreadable");
            None
        });
    let updating = job.status.to_update.iter().any(ApiResource::is_api);

    let versioned = local.has_version() || deployed.as_ref().is_some_and(|c| c.has_version());
    if updating && !versioned && usage.uses("auth") {
        confirm_change(settings, ports.prompt, AUTH_DEFAULT_CHANGED, warnings)?;
    }
    let search_warned =
        local.elasticsearch_warning || deployed.as_ref().is_some_and(|c| c.elasticsearch_warning);
    let searchable = usage.uses("searchable");
    if updating && !search_warned && searchable {
        confirm_change(settings, ports.prompt, SEARCH_DEFAULT_CHANGED, warnings)?;
    }

    let mut changed = local.record_base_version();
    if searchable {
        changed |= local.record_elasticsearch_warning();
    }
    if changed && !settings.dry_run {
        ports.config_store.write(&job.resource_dir, &local)?;
    }
    Ok(local)
}

fn confirm_change(
    settings: &CompileSettings,
    prompt: &dyn Prompt,
    message: &str,
    warnings: &mut Vec<String>,
) -> Result<(), CompileError> {
    warn!("{}", message);
    warnings.push(message.to_string());
    if settings.yes || prompt.confirm(CONTINUE_PROMPT, false)? {
        Ok(())
    } else {
        Err(CompileError::ChangeDeclined)
    }
}

/// The printed input schema followed by every generated addition.
fn output_schema(schema: &Schema, fragments: &FragmentSet) -> String {
    let mut sdl = schema.to_string();
    for addition in &fragments.schema_additions {
        sdl.push_str("\n\n");
        sdl.push_str(addition);
    }
    sdl.push('\n');
    sdl
}

/// Write the build outputs of `api` under its resource directory.
///
/// Writes `build/cloudformation-template.json`, one file per resolver under
/// `build/resolvers/`, `build/schema.graphql`, `build/parameters.json` and the
/// project's `parameters.json`.
pub fn write_build_outputs(
    api: &CompiledApi,
    minify: bool,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    let build_dir = api.resource_dir.join(BUILD_DIR_NAME);
    writer.create_dir_all(&build_dir)?;

    let template = api.fragments.to_template();
    let template_bytes = if minify {
        serde_json::to_vec(&template)
    } else {
        serde_json::to_vec_pretty(&template)
    }
    .context("serialize template")?;
    writer.write_file(&build_dir.join(CLOUDFORMATION_FILE_NAME), &template_bytes)?;

    let resolvers_dir = build_dir.join(RESOLVERS_DIR_NAME);
    writer.create_dir_all(&resolvers_dir)?;
    for (file_name, text) in &api.fragments.resolvers {
        writer.write_file(&resolvers_dir.join(file_name), text.as_bytes())?;
    }

    writer.write_file(&build_dir.join(SCHEMA_FILE_NAME), api.schema_sdl.as_bytes())?;

    let build_params =
        serde_json::to_vec_pretty(&api.build_parameters).context("serialize build parameters")?;
    writer.write_file(&build_dir.join(PARAMETERS_FILE_NAME), &build_params)?;
    let params = serde_json::to_vec_pretty(&api.parameters).context("serialize parameters")?;
    writer.write_file(&api.resource_dir.join(PARAMETERS_FILE_NAME), &params)?;

    debug!(dir = %build_dir, resolvers = api.fragments.resolvers.len(), "wrote build outputs");
    Ok(())
}

/// Every directive definition available to a project's schemas.
///
/// Service directives come first, followed by each transformer's directive
/// and supporting types in pipeline order. The search capability is always
/// included. Duplicate definitions are emitted once.
pub fn directive_definitions(
    settings: &CompileSettings,
    ports: &CompilePorts<'_>,
    resource_dir: Option<&Utf8Path>,
) -> Result<String, CompileError> {
    let config = match resource_dir {
        Some(dir) => ports.config_store.read(dir)?,
        None => None,
    };
    let decision = resolve_version(&settings.flags, config.as_ref(), None)?;
    if decision.version != CompilerVersion::V1 {
        return Ok(ports.alternate.directive_definitions(resource_dir)?);
    }

    let transformers = config.map(|c| c.transformers).unwrap_or_default();
    let custom = if transformers.is_empty() {
        Vec::new()
    } else {
        let roots = PluginRoots::for_project(
            ports.project.project_root(),
            settings.global_plugin_root.clone(),
        );
        let config_path = resource_dir
            .map(|d| d.join(TRANSFORM_CONFIG_FILE_NAME))
            .unwrap_or_else(|| Utf8PathBuf::from(TRANSFORM_CONFIG_FILE_NAME));
        PluginResolver::new(ports.loader, roots, &config_path).resolve_all(&transformers)?
    };

    let pipeline = build_pipeline(PipelineInputs {
        include_search_capability: true,
        storage: None,
        custom,
        auth_config: AuthConfig::from_security_type(DEFAULT_SECURITY_TYPE),
        admin_mode: false,
    });

    let mut seen = BTreeSet::new();
    let mut out = vec![SERVICE_DIRECTIVES.trim().to_string()];
    for entry in pipeline.entries() {
        let t = &entry.transformer;
        for sdl in t.directive().into_iter().chain(t.type_definitions()) {
            let sdl = sdl.trim().to_string();
            if seen.insert(sdl.clone()) {
                out.push(sdl);
            }
        }
    }
    Ok(out.join("\n"))
}
