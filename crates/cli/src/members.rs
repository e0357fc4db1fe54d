//! Members of parliament and parliamentary clubs.

use crate::cached::CachedApi;
use crate::stats::RunStats;
use crate::storage::OutputTree;
use chrono::Utc;
use sejmbot_client::{Club, Endpoint, Member};
use sejmbot_core::{CacheStore, Error};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// MPs looked up by the speaker name used in transcripts.
///
/// Each member is reachable by `First Last` and `Last First`, and by `Last`
/// when no other member of the term shares that surname.
#[derive(Debug, Default)]
pub struct MemberIndex {
    by_name: HashMap<String, Member>,
    members: usize,
}

impl MemberIndex {
    pub fn new(members: Vec<Member>) -> Self {
        let mut surnames: HashMap<&str, usize> = HashMap::new();
        for member in &members {
            let last = member.last_name.trim();
            if !last.is_empty() && !member.full_name().is_empty() {
                *surnames.entry(last).or_default() += 1;
            }
        }
        let shared: HashSet<String> =
            surnames.into_iter().filter(|(_, n)| *n > 1).map(|(last, _)| last.to_string()).collect();

        let mut by_name = HashMap::new();
        let count = members.len();
        for member in members {
            let first = member.first_name.trim();
            let last = member.last_name.trim();
            let full = member.full_name();
            if full.is_empty() {
                continue;
            }
            by_name.insert(format!("{last} {first}").trim().to_string(), member.clone());
            if !last.is_empty() && !shared.contains(last) {
                by_name.insert(last.to_string(), member.clone());
            }
            by_name.insert(full, member);
        }
        Self { by_name, members: count }
    }

    pub fn lookup(&self, name: &str) -> Option<&Member> {
        self.by_name.get(name.trim())
    }

    pub fn len(&self) -> usize {
        self.members
    }

    /// Fetch the MP list of a term. A missing list gives an empty index.
    pub async fn load(api: &CachedApi<'_>, store: &mut CacheStore, term: u32) -> Result<Self, Error> {
        let members: Vec<Member> = api.fetch(store, &Endpoint::members(term)).await?.into_json()?.unwrap_or_default();
        if members.is_empty() {
            tracing::warn!(term, "No MP list available, statements will not be enriched");
        } else {
            tracing::info!(term, members = members.len(), "Loaded MP list");
        }
        Ok(Self::new(members))
    }
}

/// Image extension from magic bytes.
pub fn image_extension(bytes: &[u8], fallback: &'static str) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "png"
    } else if bytes.starts_with(b"\xff\xd8") {
        "jpg"
    } else if bytes.starts_with(b"GIF") {
        "gif"
    } else {
        fallback
    }
}

/// ASCII-only file name fragment, at most 50 characters.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(50)
        .collect()
}

/// Which per-member extras to download.
#[derive(Debug, Clone, Copy)]
pub struct MemberOptions {
    pub photos: bool,
    pub voting_stats: bool,
}

impl Default for MemberOptions {
    fn default() -> Self {
        Self { photos: true, voting_stats: true }
    }
}

/// Downloads MPs and clubs into `kadencja_TT/poslowie`.
pub struct MembersScraper<'a> {
    api: CachedApi<'a>,
    store: &'a mut CacheStore,
    tree: &'a OutputTree,
    stats: RunStats,
}

impl<'a> MembersScraper<'a> {
    pub fn new(api: CachedApi<'a>, store: &'a mut CacheStore, tree: &'a OutputTree) -> Self {
        Self { api, store, tree, stats: RunStats::default() }
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }

    fn save(&mut self, path: &Path, value: &Value, kind: &str) -> Result<(), Error> {
        self.tree.write_json(path, value)?;
        self.store.register_file(path, json!({ "kind": kind }))?;
        Ok(())
    }

    fn save_bytes(&mut self, path: &Path, bytes: &[u8], kind: &str) -> Result<(), Error> {
        self.tree.write_bytes(path, bytes)?;
        self.store.register_file(path, json!({ "kind": kind }))?;
        Ok(())
    }

    /// Download the MP list, each MP's details and a per-club summary.
    pub async fn scrape_members(&mut self, term: u32, options: MemberOptions) -> Result<&RunStats, Error> {
        let dir = self.tree.members_dir(term);
        let response = self.api.fetch(self.store, &Endpoint::members(term)).await?;
        let Some(list) = response.into_json::<Value>()? else {
            return Err(Error::InvalidInput(format!("no MP list for term {term}")));
        };
        let members: Vec<Member> = serde_json::from_value(list.clone()).map_err(|e| Error::Parse(e.to_string()))?;
        tracing::info!(term, members = members.len(), "Downloading MP details");

        self.save(&dir.join("lista_poslow.json"), &list, "members")?;

        for (i, member) in members.iter().enumerate() {
            tracing::info!(progress = i + 1, total = members.len(), id = member.id, name = %member.full_name(), "MP");
            if let Err(e) = self.scrape_member(term, member, options, &dir).await {
                tracing::error!(id = member.id, error = %e, "Failed to download MP");
                self.stats.errors += 1;
            }
        }

        let summary = members_summary(term, &members);
        self.save(&dir.join("podsumowanie_poslow.json"), &summary, "members_summary")?;
        Ok(&self.stats)
    }

    async fn scrape_member(
        &mut self, term: u32, member: &Member, options: MemberOptions, dir: &Path,
    ) -> Result<(), Error> {
        let response = self.api.fetch(self.store, &Endpoint::member(term, member.id)).await?;
        let Some(mut details) = response.into_json::<Value>()? else {
            tracing::warn!(id = member.id, "MP details not available");
            self.stats.errors += 1;
            return Ok(());
        };

        let mut files = serde_json::Map::new();

        if options.photos
            && let Some((bytes, _)) = self.api.fetch_fresh(&Endpoint::member_photo(term, member.id)).await?.into_bytes()
        {
            let path = dir.join("zdjecia").join(format!("posel_{:03}.{}", member.id, image_extension(&bytes, "jpg")));
            self.save_bytes(&path, &bytes, "photo")?;
            files.insert("photo".into(), json!(relative(self.tree.root(), &path)));
            self.stats.photos_downloaded += 1;
        }

        if options.voting_stats
            && let Some(stats) =
                self.api.fetch(self.store, &Endpoint::member_voting_stats(term, member.id)).await?.into_json::<Value>()?
        {
            let path = dir.join("statystyki_glosowan").join(format!("posel_{:03}_statystyki.json", member.id));
            self.save(&path, &stats, "voting_stats")?;
            files.insert("voting_stats".into(), json!(relative(self.tree.root(), &path)));
            self.stats.voting_stats_downloaded += 1;
        }

        if let Some(object) = details.as_object_mut() {
            object.insert("_metadata".into(), json!({ "scraped_at": Utc::now(), "term": term }));
            object.insert("_files".into(), Value::Object(files));
        }

        let name = safe_filename(format!("{} {}", member.last_name, member.first_name).trim());
        let path = dir.join(format!("posel_{:03}_{name}.json", member.id));
        self.save(&path, &details, "member")?;
        self.stats.mps_downloaded += 1;
        Ok(())
    }

    /// Download the club list, club details and logos.
    pub async fn scrape_clubs(&mut self, term: u32) -> Result<&RunStats, Error> {
        let dir = self.tree.members_dir(term).join("kluby");
        let response = self.api.fetch(self.store, &Endpoint::clubs(term)).await?;
        let Some(list) = response.into_json::<Value>()? else {
            return Err(Error::InvalidInput(format!("no club list for term {term}")));
        };
        let clubs: Vec<Club> = serde_json::from_value(list.clone()).map_err(|e| Error::Parse(e.to_string()))?;
        tracing::info!(term, clubs = clubs.len(), "Downloading clubs");

        self.save(&dir.join("lista_klubow.json"), &list, "clubs")?;

        for club in &clubs {
            if let Err(e) = self.scrape_club(term, club, &dir).await {
                tracing::error!(club = %club.id, error = %e, "Failed to download club");
                self.stats.errors += 1;
            }
        }
        Ok(&self.stats)
    }

    async fn scrape_club(&mut self, term: u32, club: &Club, dir: &Path) -> Result<(), Error> {
        let name = safe_filename(if club.name.is_empty() { &club.id } else { &club.name });
        let id = safe_filename(&club.id);

        if let Some(details) = self.api.fetch(self.store, &Endpoint::club(term, &club.id)).await?.into_json::<Value>()? {
            self.save(&dir.join(format!("klub_{id}_{name}.json")), &details, "club")?;
        }

        if let Some((bytes, _)) = self.api.fetch_fresh(&Endpoint::club_logo(term, &club.id)).await?.into_bytes() {
            let path = dir.join(format!("logo_{id}_{name}.{}", image_extension(&bytes, "png")));
            self.save_bytes(&path, &bytes, "logo")?;
            self.stats.logos_downloaded += 1;
        }

        self.stats.clubs_downloaded += 1;
        Ok(())
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// MPs grouped by club.
pub fn members_summary(term: u32, members: &[Member]) -> Value {
    let mut by_club: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for member in members {
        let club = member.club.clone().unwrap_or_else(|| "niezrzeszeni".to_string());
        by_club.entry(club).or_default().push(json!({
            "id": member.id,
            "firstName": member.first_name,
            "lastName": member.last_name,
        }));
    }

    let clubs: serde_json::Map<String, Value> = by_club
        .into_iter()
        .map(|(club, members)| (club, json!({ "count": members.len(), "members": members })))
        .collect();

    json!({
        "term": term,
        "generated_at": Utc::now(),
        "total_mps": members.len(),
        "clubs_count": clubs.len(),
        "by_clubs": clubs,
    })
}
