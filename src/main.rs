use clap::Parser;
use newsportal::{
    DataDir,
    Error,
    NewsDb,
    Partition,
    Result,
    article::ArticleDraft,
    auth::Role,
    cli::{
        ArticleAction,
        CategoryAction,
        Cli,
        Command,
        ConfigAction,
        UserAction,
    },
    config::{self, BIND_ADDR_SETTING, ServerConfig},
    import,
    search,
    server::{self, AppState},
    store::PartitionStore,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("NEWSPORTAL_LOG") {
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let db = NewsDb::open(&data_dir.news_db())?;

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig::resolve(args.bind.as_deref(), &db)?;
            tracing::info!(
                bind = %config.bind,
                source = %config.source,
                data_dir = %data_dir.root().display(),
                "starting server"
            );
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::run(AppState::new(db), config.bind))?;
        }
        Command::Search(args) => {
            let reply = search::execute_search(
                &db,
                &args.message,
                args.continent.as_deref(),
            )?;
            if args.json {
                search::format_json(&reply)?;
            } else {
                search::format_human(&reply);
            }
        }
        Command::Article { action } => match action {
            ArticleAction::Add {
                partition,
                heading,
                category,
                content,
                source,
                link,
                older,
            } => {
                let partition: Partition = partition.parse()?;
                let draft = ArticleDraft {
                    heading,
                    category,
                    content,
                    source,
                    website_link: link,
                    is_older: older,
                };
                let article = db.create_article(partition, draft)?;
                println!("Added article {} to {partition}", article.id);
            }
            ArticleAction::List { partition, json } => {
                article_list(&db, partition.parse()?, json)?;
            }
            ArticleAction::Remove { partition, id } => {
                let partition: Partition = partition.parse()?;
                if !db.delete_article(partition, &id)? {
                    return Err(Error::NotFound {
                        kind: "article",
                        name: id,
                    });
                }
                println!("Removed article {id} from {partition}");
            }
        },
        Command::Category { action } => match action {
            CategoryAction::Add { partition, name } => {
                let partition: Partition = partition.parse()?;
                db.add_category(partition, &name)?;
                println!("Added category '{name}' to {partition}");
            }
            CategoryAction::List { partition, json } => {
                let categories = db.list_categories(partition.parse()?)?;
                if json {
                    println!("{}", serde_json::to_string(&categories)?);
                } else if categories.is_empty() {
                    println!("No categories defined.");
                } else {
                    for name in &categories {
                        println!("{name}");
                    }
                }
            }
            CategoryAction::Remove { partition, name } => {
                let partition: Partition = partition.parse()?;
                db.remove_category(partition, &name)?;
                println!("Removed category '{name}' from {partition}");
            }
        },
        Command::User { action } => match action {
            UserAction::Add { id, role, password } => {
                let role: Role = role.parse()?;
                db.add_user(&id, &password, role)?;
                println!("Added user '{id}' ({role})");
            }
            UserAction::List { json } => {
                let users = db.list_users()?;
                if json {
                    println!("{}", serde_json::to_string(&users)?);
                } else if users.is_empty() {
                    println!("No users registered.");
                } else {
                    for user in &users {
                        println!("{}\t{}", user.id, user.role);
                    }
                }
            }
            UserAction::Remove { id } => {
                if !db.remove_user(&id)? {
                    return Err(Error::NotFound {
                        kind: "user",
                        name: id,
                    });
                }
                println!("Removed user '{id}'");
            }
        },
        Command::Import(args) => {
            if let Some(path) = &args.path {
                let summary = import::import_file(&db, path)?;
                println!(
                    "Imported {} article(s) and {} category(ies) from {}",
                    summary.articles,
                    summary.categories,
                    path.display()
                );
            }
            if let Some(path) = &args.users {
                let count = import::import_users_file(&db, path)?;
                println!("Imported {count} user(s) from {}", path.display());
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => {
                let config = ServerConfig::resolve(None, &db)?;
                if json {
                    println!("{}", serde_json::to_string(&config)?);
                } else {
                    println!("Bind address: {} ({})", config.bind, config.source);
                }
            }
            ConfigAction::SetBind { addr } => {
                let bind = config::parse_bind(&addr)?;
                db.set_setting(BIND_ADDR_SETTING, &bind.to_string())?;
                println!("Bind address set to {bind}");
            }
            ConfigAction::ClearBind => {
                if db.remove_setting(BIND_ADDR_SETTING)? {
                    println!("Cleared stored bind address");
                } else {
                    println!("No bind address stored");
                }
            }
        },
        Command::Status(args) => {
            cmd_status(&db, &data_dir, args.json)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn article_list(db: &NewsDb, partition: Partition, json: bool) -> Result<()> {
    let articles = db.list_articles(partition)?;

    if json {
        println!("{}", serde_json::to_string(&articles)?);
    } else if articles.is_empty() {
        println!("No articles in {partition}.");
    } else {
        for article in &articles {
            println!(
                "{}\t{}\t{}",
                article.id,
                article.timestamp.format("%Y-%m-%d %H:%M"),
                article.heading
            );
        }
    }
    Ok(())
}

fn cmd_status(db: &NewsDb, data_dir: &DataDir, json: bool) -> Result<()> {
    let mut partitions = Vec::new();
    for partition in Partition::all() {
        let articles = db.list_articles(partition)?.len();
        let categories = db.list_categories(partition)?.len();
        partitions.push((partition, articles, categories));
    }
    let users = db.list_users()?.len();

    if json {
        let per_partition: serde_json::Map<String, serde_json::Value> =
            partitions
                .iter()
                .map(|(p, articles, categories)| {
                    (
                        p.key().to_string(),
                        json!({
                            "articles": articles,
                            "categories": categories,
                        }),
                    )
                })
                .collect();
        let status = json!({
            "data_dir": data_dir.root().display().to_string(),
            "users": users,
            "partitions": per_partition,
        });
        println!("{status}");
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Users: {users}");
        for (partition, articles, categories) in &partitions {
            println!(
                "  {}: {articles} article(s), {categories} category(ies)",
                partition.display_name()
            );
        }
    }
    Ok(())
}
