use std::path::PathBuf;

use clap::Parser;
use editorial2rss::{Config, Error};
use tracing_subscriber::EnvFilter;

/// editorial2rss - append editorial articles from a saved page to an RSS feed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with defaults for every option below
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Saved category page to read (default: opinion.html)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// Feed file to update (default: articles.xml)
    #[arg(long = "xml")]
    xml: Option<PathBuf>,

    /// Maximum number of items kept in the feed (default: 500)
    #[arg(short = 'n', long = "max-items")]
    max_items: Option<usize>,

    /// Title of a newly created channel
    #[arg(long = "channel-title")]
    channel_title: Option<String>,

    /// Link of a newly created channel
    #[arg(long = "channel-link")]
    channel_link: Option<String>,

    /// Description of a newly created channel
    #[arg(long = "channel-description")]
    channel_description: Option<String>,

    /// MIME type written on image enclosures (default: image/jpeg)
    #[arg(long = "enclosure-type")]
    enclosure_type: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(html) = self.html {
            config.html_path = html;
        }
        if let Some(xml) = self.xml {
            config.xml_path = xml;
        }
        if let Some(max_items) = self.max_items {
            config.max_items = max_items;
        }
        if let Some(title) = self.channel_title {
            config.channel.title = title;
        }
        if let Some(link) = self.channel_link {
            config.channel.link = link;
        }
        if let Some(description) = self.channel_description {
            config.channel.description = description;
        }
        if let Some(enclosure_type) = self.enclosure_type {
            config.enclosure_type = enclosure_type;
        }
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.into_config().and_then(|config| editorial2rss::run(&config)) {
        Ok(_) => std::process::exit(0),
        Err(Error::HtmlNotFound(_)) => {
            eprintln!("HTML not found");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
