//! Failure modes: bad URL lists, unreachable donors, unreadable donors.

use crate::common::{MapFetcher, compressed_donor, donor};
use pdfstitch::config::UrlList;
use pdfstitch::io::TransportError;
use pdfstitch::merge::{MergeRequest, Merger};
use pdfstitch::pdf::ParseError;
use pdfstitch::{ErrorKind, StitchError};
use rstest::rstest;

fn request(urls: &[&str]) -> MergeRequest {
    MergeRequest::new(UrlList::from_strings(urls).unwrap(), "merged.pdf")
}

/// Replace the first occurrence of `from` in `bytes`.
fn splice(bytes: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let at = bytes
        .windows(from.len())
        .position(|w| w == from)
        .expect("pattern present");
    let mut out = bytes[..at].to_vec();
    out.extend_from_slice(to);
    out.extend_from_slice(&bytes[at + from.len()..]);
    out
}

#[rstest]
#[case::empty_array("[]")]
#[case::not_json("https://a/1.pdf")]
#[case::not_an_array(r#"{"url": "https://a/1.pdf"}"#)]
#[case::number_entry(r#"["https://a/1.pdf", 3]"#)]
#[case::blank_entry(r#"["https://a/1.pdf", "  "]"#)]
fn test_bad_url_lists_rejected_before_fetching(#[case] json: &str) {
    let err = UrlList::parse_json(json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input, "{err}");
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_bad_entry_names_position() {
    let err = UrlList::parse_json(r#"["https://a/1.pdf", null]"#).unwrap_err();
    assert!(
        matches!(err, StitchError::InvalidUrl { index: 1, .. }),
        "{err}"
    );
}

#[tokio::test]
async fn test_missing_donor_is_transport_error() {
    let fetcher = MapFetcher::new([("a", donor("A", 1))]);
    let merger = Merger::new(fetcher, 2);

    let err = merger
        .merge(&request(&["a", "https://gone.example/x.pdf"]))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        StitchError::Transport {
            index: 1,
            source: TransportError::Status { code: 404 },
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.url(), Some("https://gone.example/x.pdf"));
    assert!(err.to_string().contains("https://gone.example/x.pdf"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_truncated_donor_is_parse_error() {
    let mut truncated = donor("B", 2);
    truncated.truncate(truncated.len() / 2);
    let fetcher = MapFetcher::new([("a", donor("A", 1)), ("b", truncated)]);
    let merger = Merger::new(fetcher, 2);

    let err = merger.merge(&request(&["a", "b"])).await.unwrap_err();

    assert!(matches!(err, StitchError::Parse { index: 1, .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.donor_index(), Some(1));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_html_instead_of_pdf() {
    let page = b"<!doctype html><html><body>Not found</body></html>".to_vec();
    let fetcher = MapFetcher::new([("login", page)]);
    let merger = Merger::new(fetcher, 1);

    let err = merger.merge(&request(&["login"])).await.unwrap_err();

    assert!(matches!(
        err,
        StitchError::Parse {
            index: 0,
            source: ParseError::MissingHeader,
            ..
        }
    ));
}

#[tokio::test]
async fn test_encrypted_donor_refused() {
    let encrypted = splice(
        &donor("E", 1),
        b"/Root 1 0 R >>",
        b"/Root 1 0 R /Encrypt << /Filter /Standard /V 1 >> >>",
    );
    let fetcher = MapFetcher::new([("enc", encrypted)]);
    let merger = Merger::new(fetcher, 1);

    let err = merger.merge(&request(&["enc"])).await.unwrap_err();

    assert!(matches!(
        err,
        StitchError::Parse {
            source: ParseError::Encrypted,
            ..
        }
    ));
}

#[rstest]
#[case::huge_columns("/Predictor 12 /Colors 1 /BitsPerComponent 8 /Columns 4611686018427387904")]
#[case::huge_colors("/Predictor 12 /Colors 9223372036854775807 /Columns 4")]
#[case::row_past_data("/Predictor 12 /Columns 100000")]
#[case::odd_bit_depth("/Predictor 12 /BitsPerComponent 5 /Columns 7")]
#[tokio::test]
async fn test_hostile_xref_stream_parameters(#[case] params: &str) {
    let hostile = splice(
        &compressed_donor("H", 2),
        b"/W [1 4 2]",
        format!("/W [1 4 2] /DecodeParms << {params} >>").as_bytes(),
    );
    let fetcher = MapFetcher::new([("a", donor("A", 1)), ("hostile", hostile)]);
    let merger = Merger::new(fetcher, 2);

    let err = merger.merge(&request(&["a", "hostile"])).await.unwrap_err();

    assert!(
        matches!(
            &err,
            StitchError::Parse {
                index: 1,
                source: ParseError::Decode { .. },
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(err.url(), Some("hostile"));
}

#[tokio::test]
async fn test_earliest_failure_wins() {
    let mut broken = donor("B", 1);
    broken.truncate(20);
    let fetcher = MapFetcher::new([("a", donor("A", 1)), ("broken", broken)]);
    let merger = Merger::new(fetcher, 4);

    // Both the second and the third donor fail; the second one is reported.
    let err = merger
        .merge(&request(&["a", "broken", "missing"]))
        .await
        .unwrap_err();

    assert_eq!(err.donor_index(), Some(1));
    assert_eq!(err.url(), Some("broken"));
}

#[tokio::test]
async fn test_sequential_merge_stops_fetching_after_failure() {
    let fetcher = MapFetcher::new([("a", donor("A", 1)), ("c", donor("C", 1))]);
    let merger = Merger::new(&fetcher, 1);

    let result = merger.merge(&request(&["a", "missing", "c"])).await;

    assert!(result.is_err());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_failed_batch_item_stops_batch() {
    let fetcher = MapFetcher::new([("a", donor("A", 1))]);
    let merger = Merger::new(&fetcher, 1);

    let err = merger
        .merge_batch(&[request(&["a"]), request(&["missing"]), request(&["a"])])
        .await
        .unwrap_err();

    assert_eq!(err.url(), Some("missing"));
    assert_eq!(fetcher.calls(), 2);
}
