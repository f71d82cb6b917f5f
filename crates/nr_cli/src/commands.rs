use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::bail;
use clap::Subcommand;
use nr_client::{NewsApp, SortKey, SortOrder};
use nr_core::{Article, Comment, Credentials, NewComment, Registration};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::duration::HumanDuration;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the mock news API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
        /// Directory holding news.json, comments.json and users.json
        #[arg(long, default_value = "crates/nr_web/data")]
        data_dir: PathBuf,
    },
    /// List articles
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, conflicts_with = "tag")]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// publishedAt, views, title or any other article field
        #[arg(long)]
        sort: Option<SortKey>,
        #[arg(long)]
        order: Option<SortOrder>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// 0 shows everything on one page
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Show one article with its comments
    Show { id_or_slug: String },
    /// Add a local comment to an article
    Comment {
        news_id: i64,
        content: String,
        #[arg(long)]
        author: Option<String>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Show the current session and check it with the server
    Whoami,
    /// Follow the realtime comment feed of an article
    Watch {
        news_id: i64,
        /// How long to watch (e.g. 30s, 1m30s)
        #[arg(long = "for", default_value = "1m")]
        duration: HumanDuration,
    },
}

fn print_article_line(article: &Article) {
    println!(
        "{:>4}  {}  {}  [{}]  views: {}",
        article.id,
        article.formatted_date.as_deref().unwrap_or(&article.published_at),
        article.title,
        article.category,
        article.views
    );
}

fn print_comment(comment: &Comment) {
    let marker = if comment.is_realtime {
        "⚡"
    } else if comment.is_local_comment {
        "✏️"
    } else {
        "💬"
    };
    println!(
        "{} {} ({}, likes: {}): {}",
        marker,
        comment.author,
        comment.formatted_date.as_deref().unwrap_or(&comment.created_at),
        comment.likes,
        comment.content
    );
}

pub async fn handle_command(command: Commands, app: &NewsApp) -> anyhow::Result<()> {
    match command {
        Commands::Serve { .. } => bail!("serve is handled before the client starts"),
        Commands::List {
            search,
            category,
            tag,
            sort,
            order,
            page,
            per_page,
        } => {
            let catalog = &app.catalog;
            catalog.fetch_all_news(false).await;
            if let Some(error) = catalog.error() {
                bail!(error);
            }

            if let Some(per_page) = per_page {
                catalog.set_items_per_page(per_page);
            }
            if let Some(search) = search {
                catalog.set_search_query(&search);
            }
            if let Some(category) = category {
                catalog.set_category(&category);
            }
            if let Some(tag) = tag {
                catalog.set_tag(&tag);
            }
            if sort.is_some() || order.is_some() {
                catalog.set_sorting(sort, order);
            }
            if page != 1 && !catalog.go_to_page(page) {
                bail!("Page {} is out of range (1..={})", page, catalog.total_pages());
            }

            let query = catalog.query();
            println!(
                "📰 {} articles, page {}/{} (sorted by {} {})",
                catalog.total(),
                query.current_page,
                catalog.total_pages().max(1),
                query.sort_by,
                query.sort_order
            );
            for article in catalog.news() {
                print_article_line(&article);
            }
            println!();
            println!("Categories: {}", catalog.categories().join(", "));
            println!("Tags: {}", catalog.tags().join(", "));
            println!("Popular:");
            for article in catalog.popular_news() {
                print_article_line(&article);
            }
        }
        Commands::Show { id_or_slug } => {
            let Some(article) = app.catalog.fetch_news_item_by_id_or_slug(&id_or_slug).await else {
                bail!(app
                    .catalog
                    .error()
                    .unwrap_or_else(|| "Статтю не знайдено".to_string()));
            };
            println!("{}", article.title);
            println!(
                "{} · {} · {}",
                article.formatted_date.as_deref().unwrap_or(&article.published_at),
                article.category,
                article.tags.join(", ")
            );
            println!();
            println!("{}", article.description);
            println!();
            println!("{}", article.content);
            println!();

            app.comments.set_current_news_id(article.id);
            app.comments.fetch_comments_by_news_id(article.id).await;
            if let Some(error) = app.comments.error() {
                eprintln!("⚠️ {}", error);
            }
            let comments = app.comments.current_news_comments();
            println!("Comments ({}):", comments.len());
            for comment in &comments {
                print_comment(comment);
            }
        }
        Commands::Comment {
            news_id,
            content,
            author,
        } => {
            let author = author.or_else(|| Some(app.auth.username()).filter(|u| !u.is_empty()));
            let avatar_url = Some(app.auth.user_avatar()).filter(|a| !a.is_empty());
            let comment = app.comments.post_comment(
                news_id,
                NewComment {
                    content,
                    author,
                    avatar_url,
                },
            )?;
            print_comment(&comment);
        }
        Commands::Login { email, password } => {
            if !app.auth.login(&Credentials { email, password }).await {
                bail!(app.auth.error().unwrap_or_default());
            }
            println!("✅ Logged in as {}", app.auth.username());
        }
        Commands::Register {
            username,
            email,
            password,
        } => {
            let registration = Registration {
                username,
                email,
                password,
            };
            if !app.auth.register(&registration).await {
                bail!(app.auth.error().unwrap_or_default());
            }
            println!("✅ Registered {}; log in to continue", registration.email);
        }
        Commands::Logout => {
            app.auth.logout();
            println!("Logged out");
        }
        Commands::Whoami => {
            if !app.auth.is_logged_in() {
                println!("Not logged in");
            } else if app.auth.check_token().await {
                let session = app.auth.session();
                match session.user {
                    Some(user) => println!("{} <{}> (id {})", user.username, user.email, user.id),
                    None => println!("Logged in"),
                }
            } else if app.auth.is_logged_in() {
                println!("Session could not be verified");
            } else {
                println!("Session expired, logged out");
            }
        }
        Commands::Watch { news_id, duration } => {
            let mut events = app.realtime.subscribe();
            app.realtime.connect(news_id)?;
            info!("Watching realtime comments for article {} for {}", news_id, duration);

            let deadline = tokio::time::sleep(duration.0);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(comment) => print_comment(&comment),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("Skipped {} realtime comments", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut deadline => break,
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            app.realtime.disconnect();
            println!(
                "{} comments for article {}",
                app.comments.comments_count(news_id),
                news_id
            );
        }
    }
    Ok(())
}
