//! Shared helpers for the integration tests.
//!
//! Donor documents are assembled in memory, served either by an in-process
//! [`MapFetcher`] or by a throwaway HTTP server on localhost.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdfstitch::io::{Fetcher, TransportError};
use pdfstitch::pdf::{Document, PdfValue};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Content stream drawn on page `k` of the donor labelled `label`.
pub fn page_text(label: &str, k: usize) -> String {
    format!("BT /F1 12 Tf 72 712 Td ({label} page {k}) Tj ET")
}

/// Texts expected from merging `donors` in order.
pub fn expected_texts(donors: &[(&str, usize)]) -> Vec<String> {
    donors
        .iter()
        .flat_map(|(label, pages)| (0..*pages).map(move |k| page_text(label, k)))
        .collect()
}

/// Writes numbered object bodies and finishes the file with a trailer.
struct RawDoc {
    data: Vec<u8>,
    offsets: BTreeMap<u32, usize>,
}

impl RawDoc {
    fn new() -> Self {
        Self {
            data: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            offsets: BTreeMap::new(),
        }
    }

    fn object(&mut self, number: u32, body: &str) {
        self.offsets.insert(number, self.data.len());
        self.data
            .extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream(&mut self, number: u32, dict: &str, content: &[u8]) {
        self.offsets.insert(number, self.data.len());
        self.data.extend_from_slice(
            format!(
                "{number} 0 obj\n<< {dict} /Length {} >>\nstream\n",
                content.len()
            )
            .as_bytes(),
        );
        self.data.extend_from_slice(content);
        self.data.extend_from_slice(b"\nendstream\nendobj\n");
    }

    /// Finish with a classic cross-reference table.
    fn finish_table(mut self, root: u32) -> Vec<u8> {
        let size = self.offsets.keys().max().copied().unwrap_or(0) + 1;
        let start = self.data.len();

        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for number in 1..size {
            match self.offsets.get(&number) {
                Some(offset) => xref.push_str(&format!("{offset:010} 00000 n \n")),
                None => xref.push_str("0000000000 00000 f \n"),
            }
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{start}\n%%EOF\n"
        ));

        self.data.extend_from_slice(xref.as_bytes());
        self.data
    }

    /// Pack `packed` into one object stream and finish with a compressed
    /// cross-reference stream.
    fn finish_packed(mut self, root: u32, packed: &[(u32, String)]) -> Vec<u8> {
        let highest = self
            .offsets
            .keys()
            .chain(packed.iter().map(|(n, _)| n))
            .max()
            .copied()
            .unwrap_or(0);
        let container = highest + 1;
        let xref_number = container + 1;

        let mut header = String::new();
        let mut body = String::new();
        for (number, object) in packed {
            header.push_str(&format!("{number} {} ", body.len()));
            body.push_str(object);
            body.push('\n');
        }
        let content = format!("{header}\n{body}");
        let first = header.len() + 1;
        self.stream(
            container,
            &format!("/Type /ObjStm /N {} /First {first}", packed.len()),
            content.as_bytes(),
        );

        let xref_offset = self.data.len();
        let size = xref_number + 1;
        let mut rows = Vec::new();
        for number in 0..size {
            let slot = packed.iter().position(|(n, _)| *n == number);
            let (kind, field, extra) = match (number, slot, self.offsets.get(&number)) {
                (0, _, _) => (0u8, 0u32, 65535u16),
                (_, Some(index), _) => (2, container, index as u16),
                (_, None, Some(offset)) => (1, *offset as u32, 0),
                (_, None, None) if number == xref_number => (1, xref_offset as u32, 0),
                _ => (0, 0, 0),
            };
            rows.push(kind);
            rows.extend_from_slice(&field.to_be_bytes());
            rows.extend_from_slice(&extra.to_be_bytes());
        }
        let compressed = zlib(&rows);

        self.offsets.insert(xref_number, xref_offset);
        self.data.extend_from_slice(
            format!(
                "{xref_number} 0 obj\n<< /Type /XRef /Size {size} /W [1 4 2] /Root {root} 0 R \
                 /Filter /FlateDecode /Length {} >>\nstream\n",
                compressed.len()
            )
            .as_bytes(),
        );
        self.data.extend_from_slice(&compressed);
        self.data.extend_from_slice(
            format!("\nendstream\nendobj\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes(),
        );
        self.data
    }
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Object numbering shared by the hand-built donors: 1 catalog, 2 page
/// tree root, 3 font, then a page and its content stream per page.
fn page_number(k: usize) -> u32 {
    4 + 2 * k as u32
}

fn pages_body(pages: usize) -> String {
    let kids: Vec<String> = (0..pages).map(|k| format!("{} 0 R", page_number(k))).collect();
    format!(
        "<< /Type /Pages /Kids [{}] /Count {pages} /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 3 0 R >> >> >>",
        kids.join(" ")
    )
}

fn page_body(k: usize) -> String {
    format!(
        "<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>",
        page_number(k) + 1
    )
}

const CATALOG: &str = "<< /Type /Catalog /Pages 2 0 R >>";
const FONT: &str = "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>";

/// A donor with a classic cross-reference table. Every page shares one
/// font through resources inherited from the page tree root.
pub fn donor(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = RawDoc::new();
    doc.object(1, CATALOG);
    doc.object(2, &pages_body(pages));
    doc.object(3, FONT);
    for k in 0..pages {
        doc.object(page_number(k), &page_body(k));
        doc.stream(page_number(k) + 1, "", page_text(label, k).as_bytes());
    }
    doc.finish_table(1)
}

/// The same document as [`donor`], written the PDF 1.5 way: page and
/// font dictionaries live in an object stream, content is deflated, and
/// the file ends with a cross-reference stream.
pub fn compressed_donor(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = RawDoc::new();
    doc.object(1, CATALOG);
    doc.object(2, &pages_body(pages));

    let mut packed = vec![(3, FONT.to_string())];
    for k in 0..pages {
        packed.push((page_number(k), page_body(k)));
        doc.stream(
            page_number(k) + 1,
            "/Filter /FlateDecode",
            &zlib(page_text(label, k).as_bytes()),
        );
    }
    doc.finish_packed(1, &packed)
}

/// A donor produced by lopdf, with compressed streams.
pub fn lopdf_donor(label: &str, pages: usize) -> Vec<u8> {
    use lopdf::{Object, Stream, dictionary};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for k in 0..pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            page_text(label, k).into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(tree));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Decoded content of every page of `bytes`, read with pdfstitch.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let mut doc = Document::load(bytes.to_vec()).unwrap();
    doc.page_ids()
        .into_iter()
        .map(|page| {
            let contents = doc
                .get_dict(page)
                .unwrap()
                .get(b"Contents")
                .and_then(PdfValue::as_reference)
                .unwrap();
            let stream = doc.get(contents).unwrap().as_stream().unwrap();
            String::from_utf8(stream.decoded().unwrap()).unwrap()
        })
        .collect()
}

/// Decoded content of every page of `bytes`, read with lopdf.
pub fn lopdf_page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|page| String::from_utf8(doc.get_page_content(*page).unwrap()).unwrap())
        .collect()
}

/// Serves fixed bytes by URL and counts requests.
#[derive(Default)]
pub struct MapFetcher {
    docs: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MapFetcher {
    pub fn new<'a>(docs: impl IntoIterator<Item = (&'a str, Vec<u8>)>) -> Self {
        Self {
            docs: docs
                .into_iter()
                .map(|(url, bytes)| (url.to_string(), bytes))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.docs
            .get(url)
            .cloned()
            .ok_or(TransportError::Status { code: 404 })
    }
}

/// A minimal HTTP/1.1 server answering `GET /<name>` from a fixed table.
///
/// Unknown paths get a 404. The server runs until the test's runtime
/// shuts down.
pub struct StubServer {
    addr: SocketAddr,
}

impl StubServer {
    pub async fn start<'a>(files: impl IntoIterator<Item = (&'a str, Vec<u8>)>) -> Self {
        let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(
            files
                .into_iter()
                .map(|(name, bytes)| (format!("/{name}"), bytes))
                .collect(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let files = Arc::clone(&files);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let line = String::from_utf8_lossy(&request);
                    let path = line.split_whitespace().nth(1).unwrap_or("/");
                    let (status, body) = match files.get(path) {
                        Some(bytes) => ("200 OK", bytes.clone()),
                        None => ("404 Not Found", b"not found".to_vec()),
                    };

                    let head = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/pdf\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/{name}", self.addr)
    }
}
