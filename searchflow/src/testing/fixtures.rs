//! Canned scenario data.

use std::sync::Arc;

use crate::core::SearchHit;

use super::mocks::{ScriptedLanguageModel, StaticPageFetcher, StaticSearchProvider};

/// Query used by the graphene scenario.
pub const GRAPHENE_QUERY: &str = "graphene batteries";

/// Expansion returned by the scripted model in the graphene scenario.
pub const GRAPHENE_EXPANSION: &str = "graphene battery lifespan";

/// Marker present in the default expansion prompt.
pub const EXPANSION_MARKER: &str = "Generate up to";

/// Marker present in the default synthesis prompt.
pub const SYNTHESIS_MARKER: &str = "write a concise overview";

/// Builds a search hit with a derived title and snippet.
#[must_use]
pub fn hit(url: &str) -> SearchHit {
    let title = url
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .replace(['/', '.'], " ");
    SearchHit::new(title, url, format!("snippet for {url}"))
}

/// Capabilities wired for one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioFixture {
    /// Search provider.
    pub search: Arc<StaticSearchProvider>,
    /// Page fetcher.
    pub fetcher: Arc<StaticPageFetcher>,
    /// Language model.
    pub model: Arc<ScriptedLanguageModel>,
    /// URLs the aggregator is expected to keep, in order.
    pub expected_urls: Vec<String>,
}

impl ScenarioFixture {
    /// Replaces the language model.
    #[must_use]
    pub fn with_model(mut self, model: ScriptedLanguageModel) -> Self {
        self.model = Arc::new(model);
        self
    }

    /// Replaces the page fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: StaticPageFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }
}

/// The "graphene batteries" scenario.
///
/// The original query finds three pages and the single expansion finds two
/// pages, both already seen (one with a trailing slash and a fragment).
#[must_use]
pub fn graphene_fixture() -> ScenarioFixture {
    let urls = [
        "https://news.example/graphene-batteries",
        "https://lab.example/research/graphene",
        "https://wiki.example/Graphene_battery",
    ];

    let search = StaticSearchProvider::new()
        .with_hits(GRAPHENE_QUERY, urls.iter().map(|u| hit(u)).collect())
        .with_hits(
            GRAPHENE_EXPANSION,
            vec![
                hit("https://lab.example/research/graphene/#results"),
                hit("HTTPS://NEWS.example/graphene-batteries"),
            ],
        );

    let fetcher = StaticPageFetcher::new()
        .with_page(urls[0], "Graphene batteries charge faster than lithium-ion cells.")
        .with_page(urls[1], "Researchers report graphene anodes retain capacity.")
        .with_page(urls[2], "A graphene battery uses graphene in its electrodes.");

    let model = ScriptedLanguageModel::new()
        .when_prompt_contains(EXPANSION_MARKER, Ok(format!(r#"["{GRAPHENE_EXPANSION}"]"#)))
        .when_prompt_contains(
            SYNTHESIS_MARKER,
            Ok("Graphene batteries promise faster charging [1][2].".to_string()),
        );

    ScenarioFixture {
        search: Arc::new(search),
        fetcher: Arc::new(fetcher),
        model: Arc::new(model),
        expected_urls: urls.iter().map(|u| (*u).to_string()).collect(),
    }
}
