//! Command handlers.

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use super::Command;
use crate::config::Config;
use crate::datetime::{format_utc_datetime, parse_duration};
use crate::db::{Database, NewUser, User, UserRepository};
use crate::rss::{
    run_scraping_cycle_forever, FeedFetcher, FeedService, SchedulerConfig, SqlStorage,
    DEFAULT_BROWSE_LIMIT,
};
use crate::session::Session;
use crate::{GatorError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M %Z";

/// Everything a command needs: configuration, database and session file.
pub struct CommandContext<'a> {
    config: &'a Config,
    db: &'a Database,
    session: Session,
}

impl<'a> CommandContext<'a> {
    /// Create a context using the session file from the configuration.
    pub fn new(config: &'a Config, db: &'a Database) -> Self {
        Self {
            config,
            db,
            session: Session::new(&config.session.path),
        }
    }

    /// Run one command, writing user-facing output to `out`.
    pub async fn execute<W: Write>(&self, command: Command, out: &mut W) -> Result<()> {
        match command {
            Command::Register { name } => self.register(out, &name).await,
            Command::Login { name } => self.login(out, &name).await,
            Command::Reset => self.reset(out).await,
            Command::Users => self.users(out).await,
            Command::AddFeed { name, url } => self.add_feed(out, &name, &url).await,
            Command::Feeds => self.feeds(out).await,
            Command::Follow { url } => self.follow(out, &url).await,
            Command::Following => self.following(out).await,
            Command::Unfollow { url } => self.unfollow(out, &url).await,
            Command::Browse { limit } => {
                self.browse(out, limit.unwrap_or(DEFAULT_BROWSE_LIMIT)).await
            }
            Command::Agg { interval } => self.aggregate(out, &interval).await,
        }
    }

    /// The logged-in user, which must exist in the database.
    async fn current_user(&self) -> Result<User> {
        let name = self.session.require_current_user()?;
        UserRepository::new(self.db.pool())
            .get_by_name(&name)
            .await?
            .ok_or_else(|| {
                GatorError::Session(format!("current user {name} does not exist; log in again"))
            })
    }

    async fn register<W: Write>(&self, out: &mut W, name: &str) -> Result<()> {
        let user = UserRepository::new(self.db.pool())
            .create(&NewUser::new(name))
            .await
            .map_err(|e| match e {
                GatorError::DuplicateKey(_) => {
                    GatorError::Validation(format!("user {name} already exists"))
                }
                other => other,
            })?;
        self.session.set_current_user(&user.name)?;

        info!(user_id = %user.id, "registered user {}", user.name);
        writeln!(out, "User {} created and logged in", user.name)?;
        Ok(())
    }

    async fn login<W: Write>(&self, out: &mut W, name: &str) -> Result<()> {
        let user = UserRepository::new(self.db.pool())
            .get_by_name(name)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user {name}")))?;
        self.session.set_current_user(&user.name)?;

        writeln!(out, "Logged in as {}", user.name)?;
        Ok(())
    }

    async fn reset<W: Write>(&self, out: &mut W) -> Result<()> {
        let removed = UserRepository::new(self.db.pool()).delete_all().await?;

        let mut state = self.session.load()?;
        state.clear_user();
        self.session.save(&state)?;

        info!(removed, "database reset");
        writeln!(out, "Database reset ({removed} users removed)")?;
        Ok(())
    }

    async fn users<W: Write>(&self, out: &mut W) -> Result<()> {
        let current = self.session.load()?.current_user_name;
        let users = UserRepository::new(self.db.pool()).list_all().await?;

        for user in users {
            if current.as_deref() == Some(user.name.as_str()) {
                writeln!(out, "* {} (current)", user.name)?;
            } else {
                writeln!(out, "* {}", user.name)?;
            }
        }
        Ok(())
    }

    async fn add_feed<W: Write>(&self, out: &mut W, name: &str, url: &str) -> Result<()> {
        let user = self.current_user().await?;
        let (feed, _) = FeedService::new(self.db).add_feed(&user, name, url).await?;

        writeln!(out, "Feed added and followed:")?;
        writeln!(out, "  id:   {}", feed.id)?;
        writeln!(out, "  name: {}", feed.name)?;
        writeln!(out, "  url:  {}", feed.url)?;
        Ok(())
    }

    async fn feeds<W: Write>(&self, out: &mut W) -> Result<()> {
        let feeds = FeedService::new(self.db).list_feeds().await?;
        if feeds.is_empty() {
            writeln!(out, "No feeds yet")?;
            return Ok(());
        }

        for entry in feeds {
            writeln!(
                out,
                "* {} ({}) added by {}",
                entry.feed.name, entry.feed.url, entry.user_name
            )?;
        }
        Ok(())
    }

    async fn follow<W: Write>(&self, out: &mut W, url: &str) -> Result<()> {
        let user = self.current_user().await?;
        let follow = FeedService::new(self.db).follow(&user, url).await?;

        writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
        Ok(())
    }

    async fn following<W: Write>(&self, out: &mut W) -> Result<()> {
        let user = self.current_user().await?;
        let follows = FeedService::new(self.db).following(&user).await?;
        if follows.is_empty() {
            writeln!(out, "{} does not follow any feeds", user.name)?;
            return Ok(());
        }

        for follow in follows {
            writeln!(out, "* {}", follow.feed_name)?;
        }
        Ok(())
    }

    async fn unfollow<W: Write>(&self, out: &mut W, url: &str) -> Result<()> {
        let user = self.current_user().await?;
        let feed = FeedService::new(self.db).unfollow(&user, url).await?;

        writeln!(out, "{} unfollowed {}", user.name, feed.name)?;
        Ok(())
    }

    async fn browse<W: Write>(&self, out: &mut W, limit: i64) -> Result<()> {
        let user = self.current_user().await?;
        let posts = FeedService::new(self.db).browse(&user, limit).await?;
        if posts.is_empty() {
            writeln!(out, "No posts yet")?;
            return Ok(());
        }

        let timezone = &self.config.display.timezone;
        for post in posts {
            writeln!(
                out,
                "{}  {}",
                format_utc_datetime(&post.published_at, timezone, DATE_FORMAT),
                post.title
            )?;
            writeln!(out, "    {}", post.url)?;
            if let Some(description) = &post.description {
                writeln!(out, "    {}", description)?;
            }
        }
        Ok(())
    }

    async fn aggregate<W: Write>(&self, out: &mut W, interval: &str) -> Result<()> {
        let interval = parse_duration(interval)?;
        let scheduler_config = SchedulerConfig::from_scraper(interval, &self.config.scraper)?;
        let fetcher = FeedFetcher::new(&self.config.scraper)?;

        writeln!(out, "Collecting feeds every {:?}", interval)?;
        out.flush()?;

        run_scraping_cycle_forever(
            Arc::new(SqlStorage::new(self.db.clone())),
            Arc::new(fetcher),
            scheduler_config,
        )
        .await
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::rss::repository::PostRepository;
    use crate::rss::types::NewPost;
    use chrono::{TimeZone, Utc};

    struct Harness {
        config: Config,
        db: Database,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.session.path = dir.path().join("session.json");
            let db = Database::open_in_memory().await.unwrap();
            Self {
                config,
                db,
                _dir: dir,
            }
        }

        async fn run(&self, command: Command) -> Result<String> {
            let ctx = CommandContext::new(&self.config, &self.db);
            let mut out = Vec::new();
            ctx.execute(command, &mut out).await?;
            Ok(String::from_utf8(out).unwrap())
        }
    }

    fn register(name: &str) -> Command {
        Command::Register {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let h = Harness::new().await;

        let out = h.run(register("kahya")).await.unwrap();
        assert!(out.contains("kahya"));
        h.run(register("holgith")).await.unwrap();

        let err = h.run(register("kahya")).await.unwrap_err();
        assert!(matches!(err, GatorError::Validation(_)));

        h.run(Command::Login {
            name: "kahya".to_string(),
        })
        .await
        .unwrap();
        let out = h.run(Command::Users).await.unwrap();
        assert_eq!(out, "* kahya (current)\n* holgith\n");

        let err = h
            .run(Command::Login {
                name: "nobody".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_commands_require_login() {
        let h = Harness::new().await;
        let err = h
            .run(Command::AddFeed {
                name: "hn".to_string(),
                url: "https://news.ycombinator.com/rss".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatorError::Session(_)));
        assert!(matches!(
            h.run(Command::Following).await,
            Err(GatorError::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_feed_flow() {
        let h = Harness::new().await;
        let url = "https://news.ycombinator.com/rss";

        h.run(register("kahya")).await.unwrap();
        h.run(Command::AddFeed {
            name: "Hacker News".to_string(),
            url: url.to_string(),
        })
        .await
        .unwrap();

        h.run(register("holgith")).await.unwrap();
        let out = h
            .run(Command::Follow {
                url: url.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(out, "holgith now follows Hacker News\n");

        let out = h.run(Command::Feeds).await.unwrap();
        assert_eq!(out, format!("* Hacker News ({url}) added by kahya\n"));

        let out = h.run(Command::Following).await.unwrap();
        assert_eq!(out, "* Hacker News\n");

        h.run(Command::Unfollow {
            url: url.to_string(),
        })
        .await
        .unwrap();
        let out = h.run(Command::Following).await.unwrap();
        assert_eq!(out, "holgith does not follow any feeds\n");
    }

    #[tokio::test]
    async fn test_browse_output() {
        let h = Harness::new().await;
        h.run(register("kahya")).await.unwrap();
        let (feed, _) = {
            let user = UserRepository::new(h.db.pool())
                .get_by_name("kahya")
                .await
                .unwrap()
                .unwrap();
            FeedService::new(&h.db)
                .add_feed(&user, "blog", "https://example.com/rss")
                .await
                .unwrap()
        };
        PostRepository::new(h.db.pool())
            .create(
                &NewPost::new(
                    feed.id,
                    "Hello",
                    "https://example.com/hello",
                    Utc.with_ymd_and_hms(2024, 10, 21, 7, 28, 0).unwrap(),
                )
                .with_description("first post"),
            )
            .await
            .unwrap();

        let out = h.run(Command::Browse { limit: None }).await.unwrap();
        assert_eq!(
            out,
            "2024-10-21 07:28 UTC  Hello\n    https://example.com/hello\n    first post\n"
        );
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let h = Harness::new().await;
        h.run(register("kahya")).await.unwrap();
        h.run(Command::AddFeed {
            name: "blog".to_string(),
            url: "https://example.com/rss".to_string(),
        })
        .await
        .unwrap();

        h.run(Command::Reset).await.unwrap();

        assert_eq!(h.run(Command::Users).await.unwrap(), "");
        assert_eq!(h.run(Command::Feeds).await.unwrap(), "No feeds yet\n");
        assert!(h
            .run(Command::Browse { limit: None })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_agg_rejects_bad_interval() {
        let h = Harness::new().await;
        for interval in ["soon", "0", "-5s"] {
            let err = h
                .run(Command::Agg {
                    interval: interval.to_string(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, GatorError::Validation(_)), "{interval}");
        }
    }
}
