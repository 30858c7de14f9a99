//! Archive playlist parsing.
//!
//! Mirrativ archives are plain HLS media playlists, but only two kinds of lines
//! matter here: `#EXTINF:<seconds>,` declarations and the `*.ts` chunk lines that
//! follow them. Everything else is noise and is skipped without error.

use std::sync::LazyLock;

use regex::Regex;

use crate::mirrativ::structs::SegmentInfo;

pub const SEGMENT_EXTENSION: &str = ".ts";

static EXTINF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#EXTINF:\s*([^,]*),").expect("EXTINF regex is valid")
});

enum ParseState {
    AwaitingDuration,
    AwaitingSegment(SegmentInfo),
}

enum Line<'a> {
    Duration(f64),
    Segment(&'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(captures) = EXTINF_REGEX.captures(line) {
        return captures[1]
            .trim()
            .parse::<f64>()
            .map_or(Line::Other, Line::Duration);
    }

    if !line.starts_with('#') && line.ends_with(SEGMENT_EXTENSION) {
        return Line::Segment(line);
    }

    Line::Other
}

/// Parses playlist text into segments, in playlist order
///
/// A chunk line fills the segment opened by the last `#EXTINF`. Chunk lines
/// without an open segment are dropped. An `#EXTINF` that is never followed by
/// its chunk still yields a segment, with empty `filename` and `fileurl`, so
/// the result always has one entry per duration declaration.
#[must_use]
pub fn parse_playlist(text: &str, base_url: &str) -> Vec<SegmentInfo> {
    let mut segments = Vec::new();
    let mut state = ParseState::AwaitingDuration;

    for line in text.lines().map(str::trim_end) {
        state = match (state, classify(line)) {
            (ParseState::AwaitingSegment(pending), Line::Duration(movie_length)) => {
                segments.push(pending);
                ParseState::AwaitingSegment(pending_segment(movie_length))
            }
            (ParseState::AwaitingDuration, Line::Duration(movie_length)) => {
                ParseState::AwaitingSegment(pending_segment(movie_length))
            }
            (ParseState::AwaitingSegment(mut pending), Line::Segment(filename)) => {
                pending.filename = filename.to_string();
                pending.fileurl = format!("{base_url}{filename}");
                segments.push(pending);
                ParseState::AwaitingDuration
            }
            (state, Line::Segment(_) | Line::Other) => state,
        };
    }

    if let ParseState::AwaitingSegment(pending) = state {
        segments.push(pending);
    }

    segments
}

const fn pending_segment(movie_length: f64) -> SegmentInfo {
    SegmentInfo {
        filename: String::new(),
        fileurl: String::new(),
        movie_length,
    }
}

/// The playlist URL with its last path component stripped, trailing `/` kept
///
/// `https://x.example/live/123/playlist.m3u8` becomes `https://x.example/live/123/`
#[must_use]
pub fn base_url(playlist_url: &str) -> String {
    let without_query = playlist_url
        .split_once(['?', '#'])
        .map_or(playlist_url, |(head, _)| head);

    match without_query.rsplit_once('/') {
        Some((head, _)) => format!("{head}/"),
        None => String::new(),
    }
}
