//! imgdb CLI - load forensic image structure into a SQLite case database

use clap::{Parser, Subcommand};
use imgdb::config::{self, ImgdbConfig};
use imgdb::ui::{self, Icons};
use imgdb::{CaseDb, Loader, Manifest, ObjectType};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "imgdb")]
#[command(version)]
#[command(about = "Store the structure of forensic disk images in a SQLite case database")]
#[command(long_about = r#"
imgdb records images, partition tables, partitions, filesystems and files
as an object hierarchy in SQLite, so the full tree can be rebuilt from the
database alone.

Example usage:
  imgdb init --database case.db --block-layout
  imgdb load --manifest walk.json --database case.db
  imgdb carve --database case.db --fs-obj-id 4 --name carved_0.jpg --size 4096
  imgdb stats --database case.db
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and initialize a new case database
    Init {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Track the byte runs of every file
        #[arg(short, long)]
        block_layout: bool,
    },

    /// Load a walker manifest (JSON) into the database
    Load {
        /// Path to the manifest file
        #[arg(short, long)]
        manifest: PathBuf,

        /// Path to the database file (initialized if it does not exist)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Track the byte runs of every file, when creating the database
        #[arg(short, long)]
        block_layout: bool,

        /// Abort the image on the first failing file
        #[arg(long)]
        stop_on_error: bool,
    },

    /// Add a carved file to a filesystem object
    Carve {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Object id of the filesystem the content was carved from
        #[arg(short, long)]
        fs_obj_id: i64,

        /// Name to record for the carved file
        #[arg(short, long)]
        name: String,

        /// Size in bytes
        #[arg(short, long)]
        size: u64,
    },

    /// Show row counts of a case database
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

const DEFAULT_DATABASE: &str = "imgdb.db";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let resolve_db = |database: Option<PathBuf>| {
        database.unwrap_or_else(|| config.database_or(Path::new(DEFAULT_DATABASE)))
    };

    match cli.command {
        Commands::Init { database, block_layout } => {
            let database = resolve_db(database);
            if database.exists() {
                anyhow::bail!("database already exists at {}", database.display());
            }
            create_database(&database, block_layout || config.block_layout)?;
            ui::success(&format!("Initialized {}", database.display()));
        }

        Commands::Load { manifest, database, block_layout, stop_on_error } => {
            let database = resolve_db(database);
            let mut db = open_or_create(&database, &config, block_layout)?;

            ui::header(&format!("Loading {}", manifest.display()));
            ui::status(Icons::DATABASE, "Database", &database.display().to_string());
            let manifest = Manifest::from_path(&manifest)?;
            tracing::info!("Manifest lists {} images", manifest.images.len());

            let stats = Loader::new(&mut db)
                .stop_on_error(stop_on_error || config.stop_on_error)
                .with_progress(ui::file_progress(manifest.entry_count()))
                .load(&manifest)?;

            if stats.failed > 0 {
                ui::warn(&format!("{} entries skipped after errors (see log)", stats.failed));
            }
            println!("{}", stats);
            db.close()?;
            ui::success("Load complete");
        }

        Commands::Carve { database, fs_obj_id, name, size } => {
            let database = resolve_db(database);
            let mut db = open_existing(&database)?;
            match db.get_object(fs_obj_id)? {
                Some(obj) if obj.kind == ObjectType::Filesystem => {}
                Some(obj) => anyhow::bail!("object {} is a {}, not a filesystem", fs_obj_id, obj.kind),
                None => anyhow::bail!("no object {} in {}", fs_obj_id, database.display()),
            }
            let obj_id = db.add_carved_file_info(fs_obj_id, &name, size)?;
            db.close()?;
            ui::success(&format!("Added carved file {} as object {}", name, obj_id));
        }

        Commands::Stats { database } => {
            let database = resolve_db(database);
            let mut db = open_existing(&database)?;
            let info = db.schema_info()?;

            ui::status(Icons::STATS, "Database", &database.display().to_string());
            ui::status(Icons::STATS, "Schema version", &info.schema_version.to_string());
            println!("{}", ui::stats_table(&db.stats()?));
            db.close()?;
        }
    }

    Ok(())
}

fn create_database(path: &Path, block_layout: bool) -> anyhow::Result<CaseDb> {
    config::ensure_db_dir(path)?;
    let mut db = CaseDb::open(path)?;
    db.initialize(block_layout)?;
    tracing::info!("Created {} (block layout: {})", path.display(), block_layout);
    Ok(db)
}

fn open_existing(path: &Path) -> anyhow::Result<CaseDb> {
    if !path.exists() {
        anyhow::bail!("no database at {} (run `imgdb init` first)", path.display());
    }
    let db = CaseDb::open(path)?;
    db.check_schema()?;
    Ok(db)
}

fn open_or_create(path: &Path, config: &ImgdbConfig, block_layout: bool) -> anyhow::Result<CaseDb> {
    if path.exists() {
        let db = open_existing(path)?;
        if block_layout && !db.block_layout_enabled() {
            ui::warn("Database was created without block layout; runs will not be stored");
        }
        Ok(db)
    } else {
        create_database(path, block_layout || config.block_layout)
    }
}
