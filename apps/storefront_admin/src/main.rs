use std::path::PathBuf;

use anyhow::{Context, Result};
use catalog_client::{
    config::load_settings_from, load_settings, ClientEvent, HttpCatalogClient, ListScope,
    StorefrontSession,
};
use clap::{Parser, Subcommand};
use shared::{
    domain::{CategoryId, ProductId},
    protocol::Product,
};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "storefront-admin", about = "Storefront catalog administration")]
struct Cli {
    /// Overrides the catalog API base URL from settings.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Products(ProductCommand),
    #[command(subcommand)]
    Categories(CategoryCommand),
    #[command(subcommand)]
    Users(UserCommand),
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "defaultSort")]
        sort: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    All,
    Show {
        id: String,
    },
    Update {
        id: String,
        /// `field=value`, repeatable.
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        assignments: Vec<(String, String)>,
    },
    Delete {
        id: String,
    },
    UploadImage {
        id: String,
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    List,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "user")]
        role: String,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {raw:?}"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in {raw:?}"));
    }
    Ok((field.to_string(), value.to_string()))
}

fn print_products(products: &[Product], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(products)?);
        return Ok(());
    }
    for product in products {
        println!(
            "{:<12} {:<40} {:>10.2} {}",
            product.id,
            product.title,
            product.price,
            if product.in_stock { "in stock" } else { "out of stock" }
        );
    }
    Ok(())
}

async fn run_products(session: &mut StorefrontSession, command: ProductCommand, json: bool) -> Result<()> {
    match command {
        ProductCommand::List {
            page,
            sort,
            category,
            search,
        } => {
            session.sort.set_sort_key_str(&sort)?;
            session.set_scope(ListScope {
                category: category.map(CategoryId::new),
                search,
            });
            for _ in 1..page {
                session.next_page();
            }
            let products = session
                .refresh()
                .await
                .context("failed to list products")?
                .unwrap_or_default();
            if products.is_empty() && !json {
                println!("no products on page {}", session.query().page);
            }
            print_products(&products, json)?;
        }
        ProductCommand::All => {
            let products = session.all_products().await?;
            print_products(&products, json)?;
        }
        ProductCommand::Show { id } => {
            let mut editor = session.product_editor();
            let draft = editor.load(&ProductId::new(id)).await?.clone();
            if json {
                println!("{}", serde_json::to_string_pretty(&draft.product)?);
            } else {
                let product = &draft.product;
                let category = editor
                    .categories()
                    .iter()
                    .find(|c| c.id == product.category_id)
                    .map(|c| c.display_name())
                    .unwrap_or_else(|| product.category_id.to_string());
                println!("{} ({})", product.title, product.slug);
                println!("  price:        {:.2}", product.price);
                println!("  manufacturer: {}", product.manufacturer);
                println!("  category:     {category}");
                println!("  in stock:     {}", product.in_stock);
                println!("  main image:   {}", product.main_image);
                for image in &draft.images {
                    println!("  image:        {}", image.image);
                }
                println!("  {}", product.description);
            }
        }
        ProductCommand::Update { id, assignments } => {
            let mut editor = session.product_editor();
            editor.load(&ProductId::new(id.clone())).await?;
            for (field, value) in &assignments {
                editor.set_field_str(field, value)?;
            }
            editor.submit().await.context("product update failed")?;
            println!("updated product {id}");
        }
        ProductCommand::Delete { id } => {
            let mut editor = session.product_editor();
            editor.delete(&ProductId::new(id.clone())).await?;
            println!("deleted product {id}");
        }
        ProductCommand::UploadImage { id, path } => {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .context("image path has no usable file name")?
                .to_string();
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut editor = session.product_editor();
            editor.load(&ProductId::new(id.clone())).await?;
            let stored = editor.upload_main_image(&filename, bytes).await?;
            editor.submit().await.context("failed to save new main image")?;
            println!("product {id} main image is now {stored}");
        }
    }
    Ok(())
}

fn log_notifications(rx: &mut tokio::sync::broadcast::Receiver<ClientEvent>) {
    loop {
        match rx.try_recv() {
            Ok(ClientEvent::Error(message)) => warn!(%message, "catalog notification"),
            Ok(event) => info!(?event, "catalog notification"),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "dropped notifications"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    let client = HttpCatalogClient::from_settings(&settings)
        .context("failed to build catalog client")?;
    info!(api = client.base_url(), "using catalog API");

    let mut session = StorefrontSession::new(client.into_shared());
    let mut notifications = session.subscribe_events();

    let outcome = match cli.command {
        Command::Products(command) => run_products(&mut session, command, cli.json).await,
        Command::Categories(CategoryCommand::List) => {
            for category in session.categories().await? {
                println!("{:<12} {}", category.id, category.display_name());
            }
            Ok(())
        }
        Command::Users(UserCommand::Create {
            email,
            password,
            role,
        }) => {
            let mut editor = session.user_editor();
            editor.set_field_str("email", &email)?;
            editor.set_field_str("password", &password)?;
            editor.set_field_str("role", &role)?;
            editor.submit().await.context("user creation failed")?;
            println!("created user {email}");
            Ok(())
        }
    };

    log_notifications(&mut notifications);
    outcome
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
