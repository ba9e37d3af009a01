//! Run and rendition reporting.

use console::style;

use crate::download::RunSummary;
use crate::error::Result;
use crate::playlist::Rendition;

/// Print the outcome of a mirror run.
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Mirror Summary:").bold());
    println!("  Playlist:   {}", summary.save_file.display());
    println!("  Renditions: {}", summary.renditions);
    if summary.renditions_dropped > 0 {
        println!("  Dropped:    {}", style(summary.renditions_dropped).red());
    }
    let segments = format!("{}/{}", summary.segments_ready, summary.segments_total);
    if summary.is_complete() {
        println!("  Segments:   {}", style(segments).green());
    } else {
        println!("  Segments:   {}", style(segments).yellow());
    }
    println!("  Duration:   {:.1}s", summary.duration_seconds);
    println!("{}", style("═".repeat(50)).dim());
}

/// Render the rendition list, one `KIND KEY URI` row per line.
pub fn format_renditions(renditions: &[Rendition]) -> String {
    renditions
        .iter()
        .map(|r| format!("{}\t{}\t{}", r.kind, r.key, r.uri.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print the renditions a master playlist offers.
pub fn print_renditions(renditions: &[Rendition], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(renditions)?);
    } else if renditions.is_empty() {
        println!("{}", style("No renditions (media playlist)").dim());
    } else {
        println!("{}", format_renditions(renditions));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::RenditionKind;

    #[test]
    fn test_format_renditions() {
        let list = vec![
            Rendition {
                kind: RenditionKind::Variant,
                key: "EXT-X-STREAM-INF-bandwidth:500000".into(),
                uri: Some("low/index.m3u8".into()),
            },
            Rendition {
                kind: RenditionKind::Media,
                key: "EXT-X-MEDIA-type:AUDIO-group-id:aac-name:en".into(),
                uri: None,
            },
        ];

        let text = format_renditions(&list);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "EXT-X-STREAM-INF\tEXT-X-STREAM-INF-bandwidth:500000\tlow/index.m3u8"
        );
        assert!(lines[1].ends_with("\t-"));
    }
}
