//! Search command - one-off query against a freshly built index.

use anyhow::Context;

use crate::config::Settings;
use crate::search::{QueryOptions, SearchHit, SearchIndex, VersionScope};

/// Arguments for the search command.
pub struct SearchArgs {
    pub query: String,
    pub include_archived: bool,
    pub all_versions: bool,
    pub limit: Option<usize>,
    pub json: bool,
}

pub fn run(settings: &Settings, args: SearchArgs) -> anyhow::Result<()> {
    let root = settings.data_root();
    let index = SearchIndex::build(&root, &settings.search)
        .with_context(|| format!("failed to index {}", root.display()))?;

    let options = QueryOptions {
        include_archived: args.include_archived,
        versions: if args.all_versions {
            VersionScope::All
        } else {
            VersionScope::Latest
        },
        limit: settings.search.effective_limit(args.limit),
    };
    let hits = index.query(&args.query, &options);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "results": hits }))?
        );
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results for \"{}\"", args.query);
        return Ok(());
    }
    for hit in &hits {
        println!("{}", format_hit(hit));
    }
    Ok(())
}

/// One line per hit: score, path, version and markers.
fn format_hit(hit: &SearchHit) -> String {
    let mut line = format!("{:.3}  {}  v{}", hit.score, hit.item_id, hit.version);
    if hit.archived {
        line.push_str("  [archived]");
    }
    if !hit.tags.is_empty() {
        line.push_str(&format!("  #{}", hit.tags.join(" #")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hit() {
        let hit = SearchHit {
            item_id: "archive/capsules/A.v2.json".into(),
            path: "archive/capsules/A.v2.json".into(),
            module: "archive".into(),
            title: "A".into(),
            version: 2,
            archived: true,
            tags: vec!["x".into(), "y".into()],
            score: 0.5,
        };
        assert_eq!(
            format_hit(&hit),
            "0.500  archive/capsules/A.v2.json  v2  [archived]  #x #y"
        );
    }
}
