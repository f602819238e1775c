use std::{collections::BTreeMap, io::Read, path::Path};

use chrono::Utc;
use clap::Parser;
use gistshelf::{
    Credentials,
    DataDir,
    GitHubSource,
    Library,
    RemoteSource,
    Snippet,
    document_index::FacetField,
    error::{self, Error},
    query::SearchQuery,
    sync::{CancelToken, SyncOptions},
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("GISTSHELF_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Sync(args) => cmd_sync(data_dir, &args)?,
        Command::Ls(args) => cmd_ls(data_dir, &args)?,
        Command::Get(args) => {
            let library = Library::open(data_dir)?;
            let snippet = library.lookup(args.idx)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snippet)?);
            } else {
                print!("{}", snippet.content());
            }
        }
        Command::Tags(args) => cmd_facet(data_dir, FacetField::Tags, args.json)?,
        Command::Languages(args) => {
            cmd_facet(data_dir, FacetField::Languages, args.json)?
        }
        Command::Owners(args) => cmd_facet(data_dir, FacetField::Owner, args.json)?,
        Command::Status(args) => cmd_status(data_dir, args.json)?,
        Command::New(args) => cmd_new(data_dir, &args)?,
        Command::Rm(args) => {
            let credentials = Credentials::load(&data_dir.config_file())?;
            let source = GitHubSource::new(&credentials.token);
            let _lock = data_dir.lock()?;
            let mut library = Library::open(data_dir)?;
            for idx in args.idx {
                let removed = library.remove(&source, idx)?;
                println!("Removed {idx}: {}", removed.description);
            }
        }
        Command::Logout => {
            let _lock = data_dir.lock()?;
            data_dir.wipe()?;
            println!("Removed token and local library");
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_sync(data_dir: DataDir, args: &cli::SyncArgs) -> error::Result<()> {
    let config_file = data_dir.config_file();
    let mut credentials = match &args.token {
        Some(token) => {
            let login = GitHubSource::new(token).login()?;
            Credentials::new(token.clone(), login)
        }
        None => Credentials::load(&config_file)?,
    };
    let source = GitHubSource::new(&credentials.token);

    let _lock = data_dir.lock()?;
    let mut library = Library::open(data_dir)?;
    let options = SyncOptions {
        rebuild: args.rebuild,
        concurrency: args.concurrency,
    };
    let report = library.sync(&source, &options, &CancelToken::new())?;

    credentials.synced_at = Some(Utc::now());
    credentials.save(&config_file)?;

    println!(
        "Synced {} gists for {}: {} new, {} removed, {} star changes",
        report.summary.gists,
        credentials.login,
        report.inserted,
        report.deleted,
        report.restarred
    );
    Ok(())
}

fn cmd_ls(data_dir: DataDir, args: &cli::LsArgs) -> error::Result<()> {
    let library = Library::open(data_dir)?;
    let query = SearchQuery {
        term: args.term.join(" "),
        tag: args.tag.clone(),
        owner: args.owner.clone(),
        language: args.language.clone(),
        starred: args.starred,
        status: args.status,
        sort: args.sort.clone(),
        limit: args.limit,
        debug: args.debug,
    };
    let outcome = library.search(&query)?;

    if args.json {
        let value = json!({
            "isQuery": outcome.is_query,
            "fuzzy": outcome.fuzzy,
            "total": outcome.total,
            "highlightTerms": outcome.highlight_terms,
            "hits": outcome.hits,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if outcome.hits.is_empty() {
        println!("No gists found.");
        return Ok(());
    }
    if outcome.fuzzy {
        println!("No exact matches; showing approximate results.");
    }
    for snippet in &outcome.hits {
        print_row(snippet);
    }
    if (outcome.hits.len() as u64) < outcome.total {
        println!("({} of {} shown)", outcome.hits.len(), outcome.total);
    }
    Ok(())
}

fn print_row(snippet: &Snippet) {
    let star = if snippet.starred { "*" } else { " " };
    let visibility = if snippet.public { "" } else { " [private]" };
    println!(
        "{:>5} {star} {}{visibility}\t{}",
        snippet.idx,
        snippet.description,
        snippet.filenames.join(", ")
    );
}

fn cmd_facet(data_dir: DataDir, field: FacetField, json: bool) -> error::Result<()> {
    let library = Library::open(data_dir)?;
    let counts = library.summarize(field)?;

    if json {
        let rows: Vec<_> = counts
            .iter()
            .map(|(name, count)| json!({ "name": name, "count": count }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if counts.is_empty() {
        println!("Nothing indexed yet.");
    } else {
        for (name, count) in &counts {
            println!("{count:>5}  {name}");
        }
    }
    Ok(())
}

fn cmd_status(data_dir: DataDir, json: bool) -> error::Result<()> {
    let credentials = match Credentials::load(&data_dir.config_file()) {
        Ok(credentials) => Some(credentials),
        Err(Error::ConfigMissing) => None,
        Err(e) => return Err(e),
    };
    let root = data_dir.root().to_path_buf();
    let library = Library::open(data_dir)?;
    let summary = library.summary()?;

    if json {
        let value = json!({
            "dataDir": root,
            "login": credentials.as_ref().map(|c| &c.login),
            "syncedAt": credentials.as_ref().and_then(|c| c.synced_at),
            "nextIdx": library.next_idx()?,
            "library": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Data directory: {}", root.display());
    match &credentials {
        Some(c) => println!("Login: {}", c.login),
        None => println!("Login: (none, run 'gistshelf sync --token <token>')"),
    }
    if let Some(at) = credentials.as_ref().and_then(|c| c.synced_at) {
        println!("Last sync: {}", at.to_rfc3339());
    }
    println!("Gists: {}", summary.gists);
    println!("Files: {}", summary.files);
    println!("Starred: {}", summary.starred);
    println!("Tags: {}", summary.tags);
    println!("Languages: {}", summary.languages);
    Ok(())
}

fn cmd_new(data_dir: DataDir, args: &cli::NewArgs) -> error::Result<()> {
    let mut files = BTreeMap::new();
    if args.files.is_empty() {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        files.insert(args.name.clone(), content);
    }
    for path in &args.files {
        files.insert(file_name(path)?, std::fs::read_to_string(path)?);
    }

    let credentials = Credentials::load(&data_dir.config_file())?;
    let source = GitHubSource::new(&credentials.token);
    let _lock = data_dir.lock()?;
    let mut library = Library::open(data_dir)?;
    let snippet = library.create(&source, files, &args.description, !args.private)?;

    println!("Created {}: {}", snippet.idx, snippet.url);
    Ok(())
}

fn file_name(path: &Path) -> error::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("not a file: {}", path.display())))
}
