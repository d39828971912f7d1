//! Per-user browsing simulation.
//!
//! Pure functions of (profile, catalog, rng): no I/O and no shared state,
//! so any number of round workers can call in without synchronization.

use crate::catalog::SiteCatalog;
use rand::seq::SliceRandom;
use rand::Rng;

/// User-agent strings shared by every simulated browser.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:91.0) Gecko/20100101 Firefox/91.0",
];

/// Fixed per-user browsing pattern, generated once at agent startup and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: u32,
    pub favorite_categories: Vec<&'static str>,
    pub source_addrs: [String; 3],
    /// Visits per minute. Kept for reporting; pacing is driven by the
    /// scheduler's inter-round interval.
    pub browsing_frequency: f64,
    pub session_duration_secs: u32,
}

impl UserProfile {
    pub fn generate(user_id: u32, catalog: &SiteCatalog, rng: &mut impl Rng) -> Self {
        let count = rng.gen_range(2..=4usize);
        let names: Vec<&'static str> = catalog.category_names().collect();
        let favorite_categories = names.choose_multiple(rng, count).copied().collect();

        let source_addrs = [
            format!("192.168.1.{}", rng.gen_range(100..=254)),
            format!("10.0.0.{}", rng.gen_range(100..=254)),
            format!("172.16.0.{}", rng.gen_range(100..=254)),
        ];

        Self {
            user_id,
            favorite_categories,
            source_addrs,
            browsing_frequency: rng.gen_range(0.5..3.0),
            session_duration_secs: rng.gen_range(30..=300),
        }
    }
}

/// One candidate visit: where, pretending to be what, from where.
#[derive(Debug, Clone)]
pub struct VisitCandidate {
    pub site: &'static str,
    pub user_agent: &'static str,
    pub source_addr: String,
}

/// Draws one visit: 70% from a favorite category, otherwise uniform over
/// the whole catalog. Deterministic under a seeded rng.
pub fn generate_visit(
    profile: &UserProfile,
    catalog: &SiteCatalog,
    rng: &mut impl Rng,
) -> VisitCandidate {
    let site = if rng.gen_bool(0.7) && !profile.favorite_categories.is_empty() {
        let category = pick(rng, &profile.favorite_categories);
        match catalog.sites_in(category) {
            Some(sites) => *pick(rng, sites),
            None => catalog.random_site(rng),
        }
    } else {
        catalog.random_site(rng)
    };

    VisitCandidate {
        site,
        user_agent: *pick(rng, USER_AGENTS),
        source_addr: pick(rng, &profile.source_addrs).clone(),
    }
}

fn pick<'a, T>(rng: &mut impl Rng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_profile_shape() {
        let catalog = SiteCatalog::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for user_id in 1..=20 {
            let profile = UserProfile::generate(user_id, &catalog, &mut rng);
            assert!((2..=4).contains(&profile.favorite_categories.len()));
            assert!(profile.source_addrs[0].starts_with("192.168.1."));
            assert!(profile.source_addrs[1].starts_with("10.0.0."));
            assert!(profile.source_addrs[2].starts_with("172.16.0."));
            assert!((0.5..3.0).contains(&profile.browsing_frequency));
        }
    }

    #[test]
    fn test_generate_visit_is_deterministic_under_seed() {
        let catalog = SiteCatalog::new();
        let mut rng_a = ChaCha8Rng::seed_from_u64(99);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);
        let profile_a = UserProfile::generate(1, &catalog, &mut rng_a);
        let profile_b = UserProfile::generate(1, &catalog, &mut rng_b);
        assert_eq!(profile_a.favorite_categories, profile_b.favorite_categories);

        for _ in 0..50 {
            let visit_a = generate_visit(&profile_a, &catalog, &mut rng_a);
            let visit_b = generate_visit(&profile_b, &catalog, &mut rng_b);
            assert_eq!(visit_a.site, visit_b.site);
            assert_eq!(visit_a.user_agent, visit_b.user_agent);
            assert_eq!(visit_a.source_addr, visit_b.source_addr);
        }
    }

    #[test]
    fn test_favorite_categories_are_preferred() {
        let catalog = SiteCatalog::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let profile = UserProfile::generate(1, &catalog, &mut rng);

        let favorite_sites: Vec<&str> = profile
            .favorite_categories
            .iter()
            .filter_map(|c| catalog.sites_in(c))
            .flat_map(|sites| sites.iter().copied())
            .collect();

        let draws = 2000;
        let mut favorites = 0;
        for _ in 0..draws {
            let visit = generate_visit(&profile, &catalog, &mut rng);
            if favorite_sites.contains(&visit.site) {
                favorites += 1;
            }
        }

        // 70% direct draws plus the uniform draw occasionally landing on a
        // favorite site anyway; well above 60% and below 90% either way.
        let share = favorites as f64 / draws as f64;
        assert!(share > 0.6, "favorite share too low: {share}");
        assert!(share < 0.9, "favorite share too high: {share}");
    }
}
