//! Static site catalog the simulated users browse.

use rand::Rng;

/// Category name to member sites.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "social",
        &[
            "facebook.com",
            "twitter.com",
            "instagram.com",
            "linkedin.com",
            "snapchat.com",
        ],
    ),
    (
        "news",
        &[
            "cnn.com",
            "bbc.com",
            "reuters.com",
            "nytimes.com",
            "washingtonpost.com",
        ],
    ),
    (
        "tech",
        &[
            "github.com",
            "stackoverflow.com",
            "techcrunch.com",
            "wired.com",
            "arstechnica.com",
        ],
    ),
    (
        "entertainment",
        &[
            "youtube.com",
            "netflix.com",
            "spotify.com",
            "twitch.tv",
            "hulu.com",
        ],
    ),
    (
        "ecommerce",
        &[
            "amazon.com",
            "ebay.com",
            "walmart.com",
            "target.com",
            "bestbuy.com",
        ],
    ),
    (
        "education",
        &[
            "coursera.org",
            "edx.org",
            "khanacademy.org",
            "udemy.com",
            "codecademy.com",
        ],
    ),
    (
        "productivity",
        &[
            "google.com",
            "microsoft.com",
            "dropbox.com",
            "slack.com",
            "notion.so",
        ],
    ),
    (
        "finance",
        &[
            "paypal.com",
            "chase.com",
            "bankofamerica.com",
            "mint.com",
            "robinhood.com",
        ],
    ),
];

/// Sites outside any category, reachable only through the uniform draw.
const ADDITIONAL_SITES: &[&str] = &[
    "reddit.com",
    "wikipedia.org",
    "medium.com",
    "quora.com",
    "pinterest.com",
    "tumblr.com",
    "flickr.com",
    "vimeo.com",
    "soundcloud.com",
    "bandcamp.com",
    "goodreads.com",
    "imdb.com",
    "rottentomatoes.com",
    "metacritic.com",
    "weather.com",
    "accuweather.com",
    "maps.google.com",
    "yelp.com",
    "tripadvisor.com",
];

#[derive(Debug)]
pub struct SiteCatalog {
    all_sites: Vec<&'static str>,
}

impl SiteCatalog {
    pub fn new() -> Self {
        let all_sites = CATEGORIES
            .iter()
            .flat_map(|(_, sites)| sites.iter().copied())
            .chain(ADDITIONAL_SITES.iter().copied())
            .collect();
        Self { all_sites }
    }

    pub fn category_names(&self) -> impl Iterator<Item = &'static str> {
        CATEGORIES.iter().map(|(name, _)| *name)
    }

    pub fn sites_in(&self, category: &str) -> Option<&'static [&'static str]> {
        CATEGORIES
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, sites)| *sites)
    }

    /// Uniform draw over the full catalog.
    pub fn random_site(&self, rng: &mut impl Rng) -> &'static str {
        self.all_sites[rng.gen_range(0..self.all_sites.len())]
    }

    pub fn len(&self) -> usize {
        self.all_sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_sites.is_empty()
    }
}

impl Default for SiteCatalog {
    fn default() -> Self {
        Self::new()
    }
}
