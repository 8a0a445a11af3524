//! git-safe: transparent file encryption for git repositories
//!
//! Repository commands:
//!   init                 - generate a key and wire up the repo filters
//!   unlock               - install a key and decrypt the working tree
//!   lock                 - remove the key and restore ciphertext on disk
//!   status               - show key source, filter wiring, per-file state
//!   export-key <out>     - copy the repo key out for out-of-band sharing
//!
//! Plumbing commands (invoked by git, not by hand):
//!   clean [<file>]       - encrypt stdin to stdout
//!   smudge [<file>]      - decrypt stdin to stdout
//!   diff <file>          - textconv endpoint for readable diffs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::{Path, PathBuf};

use gitsafe_core::{attributes, GitSafeConfig};
use gitsafe_crypto::CryptoError;
use gitsafe_keys::LoadedKey;

mod repo;
use repo::GitRepo;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "git-safe",
    version,
    about = "Transparent file encryption for git",
    long_about = "git-safe: encrypt selected files when they enter the index and decrypt \
                  them on checkout, using git clean/smudge filters. Only ciphertext ever \
                  reaches the object store."
)]
struct Cli {
    /// Run as if started in this directory
    #[arg(long, short = 'C', global = true, value_name = "DIR")]
    chdir: Option<PathBuf>,

    /// Key file to use instead of the discovery chain
    #[arg(long, global = true, value_name = "PATH")]
    key_file: Option<PathBuf>,

    /// Log filter written to stderr (RUST_LOG overrides)
    #[arg(long, global = true, env = "GIT_SAFE_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate (or adopt) a repository key and configure the filters
    Init,

    /// Install a key and decrypt the working tree
    ///
    /// The key comes from --key-file, $GIT_SAFE_KEY_FILE, $GIT_SAFE_KEY,
    /// or the config file; it is copied into .git/git-safe/key.
    Unlock,

    /// Remove the local key and restore ciphertext in the working tree
    Lock {
        /// Lock even when filtered files have uncommitted changes
        #[arg(long)]
        force: bool,
    },

    /// Show key source, filter wiring, and per-file encryption state
    Status,

    /// Write the repository key to a file for out-of-band sharing
    #[command(name = "export-key")]
    ExportKey {
        /// Destination path (written mode 600)
        output: PathBuf,
    },

    // ── Plumbing endpoints wired into git config ───────────────────────────────

    /// Clean filter: encrypt stdin to stdout (invoked by git)
    Clean {
        /// Path being filtered (git's %f), used in diagnostics only
        file: Option<String>,
    },

    /// Smudge filter: decrypt stdin to stdout (invoked by git)
    Smudge {
        /// Path being filtered (git's %f), used in diagnostics only
        file: Option<String>,
    },

    /// Textconv endpoint: print a file's plaintext for diffs
    Diff {
        file: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    if let Some(dir) = &cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("changing directory to {}", dir.display()))?;
    }

    let key_file = cli.key_file.as_deref();
    match cli.command {
        Commands::Init => cmd_init(key_file),
        Commands::Unlock => cmd_unlock(key_file),
        Commands::Lock { force } => cmd_lock(force),
        Commands::Status => cmd_status(key_file),
        Commands::ExportKey { output } => cmd_export_key(key_file, &output),
        Commands::Clean { file } => cmd_clean(key_file, file.as_deref()),
        Commands::Smudge { file } => cmd_smudge(key_file, file.as_deref()),
        Commands::Diff { file } => cmd_diff(key_file, &file),
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to the filter payload; all logging goes to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Resolve repository, config, and key for the filter endpoints.
fn filter_keys(key_override: Option<&Path>) -> Result<LoadedKey> {
    let repo = GitRepo::discover()?;
    let config = GitSafeConfig::load(&repo.work_tree)?;
    gitsafe_keys::find_key(key_override, &config, &repo.git_dir, &repo.work_tree)
}

/// Map an engine error to a diagnostic with a per-kind remediation hint.
fn filter_error(op: &str, file: Option<&str>, err: CryptoError) -> anyhow::Error {
    let path = file.unwrap_or("<stdin>");
    let hint = match &err {
        CryptoError::AuthenticationFailed => {
            "wrong key for this repository, or the stored content was tampered with"
        }
        CryptoError::UnsupportedVersion(_) => {
            "this file was written by a newer git-safe; upgrade to read it"
        }
        CryptoError::MalformedEnvelope(_) => {
            "the stored content carries the envelope magic but does not parse; it may be corrupted"
        }
        CryptoError::InvalidKeyLength { .. } => {
            "the key file is damaged; restore it from a backup or re-import it"
        }
    };
    anyhow::anyhow!("{op} failed for {path}: {err} ({hint})")
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut input = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("reading filter input")?;
    Ok(input)
}

/// Single write of the complete result: a failed filter must never leave a
/// partial payload on stdout.
fn write_stdout(bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes).context("writing filter output")?;
    stdout.flush().context("flushing filter output")
}

fn load_attribute_patterns(repo: &GitRepo, filter: &str) -> Result<Vec<String>> {
    let path = repo.work_tree.join(".gitattributes");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(attributes::filter_patterns(&content, filter))
}

/// Tracked files matching the filter patterns.
fn filtered_files(repo: &GitRepo, patterns: &[String]) -> Result<Vec<String>> {
    let compiled = attributes::compile_patterns(patterns);
    Ok(repo
        .tracked_files()?
        .into_iter()
        .filter(|path| attributes::matches_any(path, &compiled))
        .collect())
}

/// Point git's filter and diff drivers at this executable.
fn install_filter_config(repo: &GitRepo, filter: &str) -> Result<()> {
    let exe = std::env::current_exe().context("locating the git-safe executable")?;
    let exe = exe.to_string_lossy();

    repo.config_set(&format!("filter.{filter}.clean"), &format!("\"{exe}\" clean %f"))?;
    repo.config_set(
        &format!("filter.{filter}.smudge"),
        &format!("\"{exe}\" smudge %f"),
    )?;
    repo.config_set(&format!("filter.{filter}.required"), "true")?;
    repo.config_set(&format!("diff.{filter}.textconv"), &format!("\"{exe}\" diff"))?;
    tracing::debug!("filter.{filter} wired to {exe}");
    Ok(())
}

fn remove_filter_config(repo: &GitRepo, filter: &str) -> Result<()> {
    repo.config_unset(&format!("filter.{filter}.clean"))?;
    repo.config_unset(&format!("filter.{filter}.smudge"))?;
    repo.config_unset(&format!("filter.{filter}.required"))?;
    repo.config_unset(&format!("diff.{filter}.textconv"))?;
    Ok(())
}

/// Delete and re-checkout every tracked file matching the filter patterns,
/// forcing git to run the configured filters (or none) again.
fn refresh_filtered_files(repo: &GitRepo, filter: &str) -> Result<usize> {
    let patterns = load_attribute_patterns(repo, filter)?;
    let matched = filtered_files(repo, &patterns)?;
    if matched.is_empty() {
        return Ok(0);
    }
    tracing::debug!("re-checking out {} filtered file(s)", matched.len());

    let pb = make_progress_bar(matched.len() as u64, "checkout");
    for path in &matched {
        let full = repo.work_tree.join(path);
        if full.exists() {
            std::fs::remove_file(&full)
                .with_context(|| format!("removing {}", full.display()))?;
        }
        pb.inc(1);
    }
    repo.checkout_paths(&matched)?;
    pb.finish_and_clear();

    Ok(matched.len())
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb
}

// ── `git-safe init` ───────────────────────────────────────────────────────────

fn cmd_init(key_override: Option<&Path>) -> Result<()> {
    let repo = GitRepo::discover()?;
    let config = GitSafeConfig::load(&repo.work_tree)?;
    let filter = &config.filter.name;

    let key_path = gitsafe_keys::repo_key_path(&repo.git_dir);
    if key_path.exists() {
        println!("Key already present: {}", key_path.display());
    } else {
        // Adopt a key the discovery chain can see (flag, env, config,
        // legacy file); only generate when there is none.
        match gitsafe_keys::find_key(key_override, &config, &repo.git_dir, &repo.work_tree) {
            Ok(loaded) => {
                gitsafe_keys::keyfile::save(&key_path, &loaded.material)?;
                println!("Imported key from {}", loaded.source);
            }
            Err(err) if key_override.is_some() => return Err(err),
            Err(_) => {
                gitsafe_keys::keyfile::generate_to(&key_path)?;
                println!("Generated new key: {}", key_path.display());
            }
        }
    }

    install_filter_config(&repo, filter)?;
    println!("Configured filter.{filter} and diff.{filter} in git config");

    if !config.init.patterns.is_empty() {
        let attrs_path = repo.work_tree.join(".gitattributes");
        let current = if attrs_path.exists() {
            std::fs::read_to_string(&attrs_path)
                .with_context(|| format!("reading {}", attrs_path.display()))?
        } else {
            String::new()
        };
        let (updated, added) = attributes::ensure_patterns(&current, &config.init.patterns, filter);
        if added > 0 {
            std::fs::write(&attrs_path, updated)
                .with_context(|| format!("writing {}", attrs_path.display()))?;
            println!("Added {added} pattern(s) to .gitattributes");
        }
    }

    let patterns = load_attribute_patterns(&repo, filter)?;
    if patterns.is_empty() {
        println!();
        println!("No patterns are bound yet. Add lines like:");
        println!("  *.secret filter={filter} diff={filter}");
        println!("to .gitattributes, then re-stage tracked files through the filter:");
        println!("  git add --renormalize .");
    }

    Ok(())
}

// ── `git-safe unlock` ─────────────────────────────────────────────────────────

fn cmd_unlock(key_override: Option<&Path>) -> Result<()> {
    let repo = GitRepo::discover()?;
    let config = GitSafeConfig::load(&repo.work_tree)?;
    let filter = &config.filter.name;

    let loaded = gitsafe_keys::find_key(key_override, &config, &repo.git_dir, &repo.work_tree)?;
    let key_path = gitsafe_keys::repo_key_path(&repo.git_dir);
    gitsafe_keys::keyfile::save(&key_path, &loaded.material)?;
    println!("Key installed from {}", loaded.source);

    install_filter_config(&repo, filter)?;

    let refreshed = refresh_filtered_files(&repo, filter)?;
    println!("Unlocked: {refreshed} file(s) decrypted in the working tree");
    Ok(())
}

// ── `git-safe lock` ───────────────────────────────────────────────────────────

fn cmd_lock(force: bool) -> Result<()> {
    let repo = GitRepo::discover()?;
    let config = GitSafeConfig::load(&repo.work_tree)?;
    let filter = &config.filter.name;

    let patterns = load_attribute_patterns(&repo, filter)?;
    if !force {
        let compiled = attributes::compile_patterns(&patterns);
        let dirty: Vec<String> = repo
            .status_porcelain()?
            .into_iter()
            .filter(|(_, path)| attributes::matches_any(path, &compiled))
            .map(|(code, path)| format!("  {code} {path}"))
            .collect();
        if !dirty.is_empty() {
            anyhow::bail!(
                "uncommitted changes in filtered files:\n{}\n\
                 commit or stash them first, or run: git-safe lock --force",
                dirty.join("\n")
            );
        }
    }

    // Deconfigure first so the re-checkout below skips the smudge filter
    remove_filter_config(&repo, filter)?;

    let key_path = gitsafe_keys::repo_key_path(&repo.git_dir);
    if key_path.exists() {
        std::fs::remove_file(&key_path)
            .with_context(|| format!("removing key file: {}", key_path.display()))?;
        println!("Removed key: {}", key_path.display());
    }

    let refreshed = refresh_filtered_files(&repo, filter)?;
    println!("Locked: {refreshed} file(s) restored to ciphertext in the working tree");
    Ok(())
}

// ── `git-safe status` ─────────────────────────────────────────────────────────

fn cmd_status(key_override: Option<&Path>) -> Result<()> {
    let repo = GitRepo::discover()?;
    let config = GitSafeConfig::load(&repo.work_tree)?;
    let filter = &config.filter.name;

    println!("Repository: {}", repo.work_tree.display());

    match gitsafe_keys::find_key(key_override, &config, &repo.git_dir, &repo.work_tree) {
        Ok(loaded) => println!("Key:        present ({})", loaded.source),
        Err(_) => println!("Key:        not found"),
    }

    let clean_cmd = repo.config_get(&format!("filter.{filter}.clean"));
    let smudge_cmd = repo.config_get(&format!("filter.{filter}.smudge"));
    match (clean_cmd, smudge_cmd) {
        (Some(_), Some(_)) => println!("Filters:    configured (filter.{filter})"),
        _ => println!("Filters:    not configured; run: git-safe init"),
    }

    let patterns = load_attribute_patterns(&repo, filter)?;
    if patterns.is_empty() {
        println!("Patterns:   none bound in .gitattributes");
        return Ok(());
    }
    println!("Patterns:   {}", patterns.join(", "));

    println!();
    for path in filtered_files(&repo, &patterns)? {
        let state = file_state(&repo.work_tree.join(&path));
        println!("  {state:<10} {path}");
    }
    Ok(())
}

/// Sniff a working-tree file: envelope magic means still encrypted.
fn file_state(path: &Path) -> &'static str {
    let mut prefix = [0u8; gitsafe_crypto::MAGIC.len()];
    match std::fs::File::open(path) {
        Ok(mut f) => match f.read_exact(&mut prefix) {
            Ok(()) if prefix == *gitsafe_crypto::MAGIC => "encrypted",
            // Shorter than the magic can only be plaintext
            Ok(()) | Err(_) => "decrypted",
        },
        Err(_) => "missing",
    }
}

// ── `git-safe export-key` ─────────────────────────────────────────────────────

fn cmd_export_key(key_override: Option<&Path>, output: &Path) -> Result<()> {
    let repo = GitRepo::discover()?;
    let config = GitSafeConfig::load(&repo.work_tree)?;
    let loaded = gitsafe_keys::find_key(key_override, &config, &repo.git_dir, &repo.work_tree)?;

    gitsafe_keys::keyfile::save(output, &loaded.material)?;
    println!(
        "Key exported to {} (mode 600); share it out-of-band only, never commit it",
        output.display()
    );
    Ok(())
}

// ── Filter plumbing: `clean`, `smudge`, `diff` ────────────────────────────────

fn cmd_clean(key_override: Option<&Path>, file: Option<&str>) -> Result<()> {
    let keys = filter_keys(key_override)?;
    let input = read_stdin()?;

    let output = gitsafe_crypto::clean(&input, &keys.material)
        .map_err(|e| filter_error("clean", file, e))?;
    write_stdout(&output)
}

fn cmd_smudge(key_override: Option<&Path>, file: Option<&str>) -> Result<()> {
    let keys = filter_keys(key_override)?;
    let input = read_stdin()?;

    let output = gitsafe_crypto::smudge(&input, &keys.material)
        .map_err(|e| filter_error("smudge", file, e))?;
    write_stdout(&output)
}

fn cmd_diff(key_override: Option<&Path>, file: &Path) -> Result<()> {
    let content =
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    if !gitsafe_crypto::is_envelope(&content) {
        return write_stdout(&content);
    }

    let keys = filter_keys(key_override)?;
    let plaintext = gitsafe_crypto::decrypt(&content, &keys.material)
        .map_err(|e| filter_error("diff", Some(&file.to_string_lossy()), e))?;
    write_stdout(&plaintext)
}
