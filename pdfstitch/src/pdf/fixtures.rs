//! Hand-assembled PDF files for unit tests.

use std::collections::BTreeMap;

use crate::pdf::filter::flate_encode;

/// Writes object bodies verbatim and records their offsets, then finishes
/// the file with a classic table, a cross-reference stream, or both.
pub(crate) struct RawPdf {
    data: Vec<u8>,
    offsets: BTreeMap<u32, usize>,
    fresh: bool,
}

impl RawPdf {
    pub(crate) fn new() -> Self {
        Self {
            data: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            offsets: BTreeMap::new(),
            fresh: true,
        }
    }

    /// Continue an existing file as an incremental update.
    pub(crate) fn extend(base: Vec<u8>) -> Self {
        let mut data = base;
        if !data.ends_with(b"\n") {
            data.push(b'\n');
        }
        Self {
            data,
            offsets: BTreeMap::new(),
            fresh: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn offset_of(&self, number: u32) -> usize {
        self.offsets[&number]
    }

    pub(crate) fn object(&mut self, number: u32, body: &str) -> &mut Self {
        self.offsets.insert(number, self.data.len());
        self.data
            .extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
        self
    }

    pub(crate) fn stream_object(&mut self, number: u32, dict: &str, content: &[u8]) -> &mut Self {
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
        self
    }

    /// An uncompressed `/ObjStm` holding `members` in order.
    pub(crate) fn object_stream(&mut self, number: u32, members: &[(u32, &str)]) -> &mut Self {
        let mut header = String::new();
        let mut bodies = String::new();
        for (member, body) in members {
            header.push_str(&format!("{member} {} ", bodies.len()));
            bodies.push_str(body);
            bodies.push(' ');
        }
        let first = header.len();
        let content = format!("{header}{bodies}");
        self.stream_object(
            number,
            &format!("/Type /ObjStm /N {} /First {first}", members.len()),
            content.as_bytes(),
        )
    }

    fn max_number(&self, compressed: &[(u32, u32, u32)]) -> u32 {
        let from_offsets = self.offsets.keys().next_back().copied().unwrap_or(0);
        let from_compressed = compressed.iter().map(|(n, _, _)| *n).max().unwrap_or(0);
        from_offsets.max(from_compressed)
    }

    pub(crate) fn finish_table(mut self, trailer: &str) -> Vec<u8> {
        let size = self.max_number(&[]) + 1;
        let xref_at = self.data.len();
        self.write_table(&format!("/Size {size} {trailer}"));
        self.data
            .extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
        self.data
    }

    fn write_table(&mut self, trailer: &str) {
        let mut table = String::from("xref\n");
        if self.fresh {
            table.push_str("0 1\n0000000000 65535 f \n");
        }
        for (number, offset) in &self.offsets {
            table.push_str(&format!("{number} 1\n{offset:010} 00000 n \n"));
        }
        table.push_str(&format!("trailer\n<< {trailer} >>\n"));
        self.data.extend_from_slice(table.as_bytes());
    }

    /// Finish with a Flate-compressed cross-reference stream using the PNG
    /// "up" predictor. `compressed` lists `(member, container, index)`.
    pub(crate) fn finish_stream(mut self, trailer: &str, compressed: &[(u32, u32, u32)]) -> Vec<u8> {
        let number = self.max_number(compressed) + 1;
        let xref_at = self.data.len();

        let mut rows = BTreeMap::new();
        if self.fresh {
            rows.insert(0, row(0, 0, 0xffff));
        }
        for (member, offset) in &self.offsets {
            rows.insert(*member, row(1, *offset as u32, 0));
        }
        for (member, container, index) in compressed {
            rows.insert(*member, row(2, *container, *index as u16));
        }
        rows.insert(number, row(1, xref_at as u32, 0));

        self.write_xref_stream(number, &rows, trailer);
        self.data
            .extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
        self.data
    }

    /// Finish with a classic table whose trailer points at a side
    /// cross-reference stream holding the compressed entries.
    pub(crate) fn finish_hybrid(mut self, trailer: &str, compressed: &[(u32, u32, u32)]) -> Vec<u8> {
        let number = self.max_number(compressed) + 1;
        let stream_at = self.data.len();

        let rows: BTreeMap<u32, [u8; 7]> = compressed
            .iter()
            .map(|(member, container, index)| (*member, row(2, *container, *index as u16)))
            .collect();
        self.write_xref_stream(number, &rows, "");

        let xref_at = self.data.len();
        let size = number + 1;
        self.write_table(&format!("/Size {size} /XRefStm {stream_at} {trailer}"));
        self.data
            .extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());
        self.data
    }

    fn write_xref_stream(&mut self, number: u32, rows: &BTreeMap<u32, [u8; 7]>, trailer: &str) {
        let index: Vec<String> = rows.keys().map(|n| format!("{n} 1")).collect();

        let mut predicted = Vec::new();
        let mut previous = [0u8; 7];
        for current in rows.values() {
            predicted.push(2);
            for (byte, above) in current.iter().zip(previous) {
                predicted.push(byte.wrapping_sub(above));
            }
            previous = *current;
        }
        let content = flate_encode(&predicted).unwrap();

        let dict = format!(
            "/Type /XRef /Size {} /W [1 4 2] /Index [{}] /Filter /FlateDecode \
             /DecodeParms << /Predictor 12 /Columns 7 >> {trailer}",
            number + 1,
            index.join(" ")
        );
        self.stream_object(number, &dict, &content);
    }
}

fn row(kind: u8, second: u32, third: u16) -> [u8; 7] {
    let mut out = [0u8; 7];
    out[0] = kind;
    out[1..5].copy_from_slice(&second.to_be_bytes());
    out[5..7].copy_from_slice(&third.to_be_bytes());
    out
}

/// Offset recorded after the last `startxref`.
pub(crate) fn startxref_of(data: &[u8]) -> usize {
    let keyword = b"startxref";
    let at = data
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .unwrap();
    let digits: String = data[at + keyword.len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|b| *b as char)
        .collect();
    digits.parse().unwrap()
}

/// A flat document: catalog 1, pages root 2 carrying the inherited
/// MediaBox and Resources, shared font 3, then page `k` at `4 + 2k` with
/// its content stream at `5 + 2k`.
pub(crate) fn sample_pdf(page_count: usize) -> Vec<u8> {
    let mut pdf = RawPdf::new();
    let kids: Vec<String> = (0..page_count)
        .map(|k| format!("{} 0 R", 4 + 2 * k))
        .collect();

    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {page_count} /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> >>",
            kids.join(" ")
        ),
    );
    pdf.object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");

    for k in 0..page_count {
        let page = 4 + 2 * k as u32;
        pdf.object(
            page,
            &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1),
        );
        pdf.stream_object(page + 1, "", page_content(k).as_bytes());
    }

    pdf.finish_table("/Root 1 0 R")
}

/// Content stream text of page `k` in [`sample_pdf`].
pub(crate) fn page_content(k: usize) -> String {
    format!("BT /F1 12 Tf 72 712 Td (Page {}) Tj ET", k + 1)
}
