//! Console rendering of search results

use std::fmt::Write;

use cinevec_core::QueryResult;
use serde::Serialize;

/// One block per result:
///
/// ```text
/// Title: Lion King
/// Description: The Lion King is ...
/// Score: 0.7321
///
/// ```
pub fn render_text(results: &[QueryResult]) -> String {
    let mut out = String::new();
    for result in results {
        // Writing to a String cannot fail
        let _ = writeln!(out, "Title: {}", result.record.title);
        let _ = writeln!(out, "Description: {}", result.record.description);
        let _ = writeln!(out, "Score: {}", result.score);
        out.push('\n');
    }
    out
}

#[derive(Debug, Serialize)]
struct JsonResult<'a> {
    key: u64,
    title: &'a str,
    description: &'a str,
    score: f32,
}

#[derive(Debug, Serialize)]
struct JsonResponse<'a> {
    query: &'a str,
    count: usize,
    results: Vec<JsonResult<'a>>,
}

/// Pretty-printed `{ query, count, results: [{key, title, description, score}] }`.
pub fn render_json(query: &str, results: &[QueryResult]) -> serde_json::Result<String> {
    let response = JsonResponse {
        query,
        count: results.len(),
        results: results
            .iter()
            .map(|r| JsonResult {
                key: r.record.key,
                title: &r.record.title,
                description: &r.record.description,
                score: r.score,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinevec_core::MovieRecord;

    fn results() -> Vec<QueryResult> {
        vec![
            QueryResult {
                record: MovieRecord::new(0, "Lion King", "A lion reclaims the Pride Lands."),
                score: 0.5,
            },
            QueryResult {
                record: MovieRecord::new(3, "Shrek", "An ogre rescues a princess."),
                score: 1.25,
            },
        ]
    }

    #[test]
    fn test_render_text_blocks() {
        let text = render_text(&results());
        assert_eq!(
            text,
            "Title: Lion King\nDescription: A lion reclaims the Pride Lands.\nScore: 0.5\n\n\
             Title: Shrek\nDescription: An ogre rescues a princess.\nScore: 1.25\n\n"
        );
    }

    #[test]
    fn test_render_text_empty() {
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn test_render_json_shape() {
        let json = render_json("A movie about lions", &results()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["query"], "A movie about lions");
        assert_eq!(value["count"], 2);
        assert_eq!(value["results"][0]["key"], 0);
        assert_eq!(value["results"][0]["title"], "Lion King");
        assert_eq!(value["results"][1]["score"], 1.25);
        assert!(value["results"][0].get("vector").is_none());
    }
}
