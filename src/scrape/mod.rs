//! Recipe link extraction.
//!
//! The vendor's recipe page lists each weekly recipe inside a
//! `div[data-zest]` card. Cards link to the printable recipe image hosted on
//! the asset CDN with a visible label such as "Voir la recette".

use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::fetch::{FetchError, Fetcher};

/// Hostname fragment of the image CDN.
pub const ASSET_HOST: &str = "ctfassets.net";

/// Keyword looked for in the lower-cased link text.
pub const RECIPE_KEYWORD: &str = "recette";

/// Selector scoping extraction to recipe cards.
pub const CARD_LINK_SELECTOR: &str = "div[data-zest] a[href]";

/// Predicates applied to every candidate anchor.
#[derive(Debug, Clone)]
pub struct ExtractRules {
    pub selector: String,
    pub asset_host: String,
    pub keyword: String,
}

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            selector: CARD_LINK_SELECTOR.to_string(),
            asset_host: ASSET_HOST.to_string(),
            keyword: RECIPE_KEYWORD.to_string(),
        }
    }
}

/// Extract recipe image links with the default rules.
pub fn extract_recipe_links(html: &str) -> Vec<String> {
    extract_links(html, &ExtractRules::default())
}

/// Extract every `href` whose target contains the asset host and whose
/// visible text contains the keyword, in document order.
///
/// Duplicates are kept. An invalid selector yields no links.
pub fn extract_links(html: &str, rules: &ExtractRules) -> Vec<String> {
    let selector = match Selector::parse(&rules.selector) {
        Ok(s) => s,
        Err(e) => {
            debug!("Invalid selector {:?}: {}", rules.selector, e);
            return Vec::new();
        }
    };
    let keyword = rules.keyword.to_lowercase();

    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let text = anchor.text().collect::<String>().to_lowercase();
        if !href.contains(rules.asset_host.as_str()) || !text.contains(&keyword) {
            continue;
        }

        links.push(href.to_string());
    }

    links
}

/// Fetch the source page and extract its recipe links.
pub async fn scrape_page(fetcher: &Fetcher, url: &Url) -> Result<Vec<String>, FetchError> {
    info!("Scraping {}", url);
    let html = fetcher.fetch_text(url).await?;
    let links = extract_recipe_links(&html);
    info!("Found {} recipe link(s)", links.len());
    Ok(links)
}
