use crate::sort::SortOrder;
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::{Header, HeaderView};

/// Sort order declared by the `SO` tag of the `@HD` line, if any.
pub fn declared_sort_order(text: &[u8]) -> Option<SortOrder> {
    let text = String::from_utf8_lossy(text);
    let hd = text.lines().find(|line| line.starts_with("@HD"))?;
    hd.split('\t')
        .find_map(|field| field.strip_prefix("SO:"))
        .and_then(|so| match so {
            "coordinate" => Some(SortOrder::Coordinate),
            "queryname" => Some(SortOrder::Queryname),
            _ => None,
        })
}

/// Header text with the `@HD` sort order replaced (an `@HD` line is added when missing).
pub fn with_sort_order(text: &[u8], order: SortOrder) -> String {
    let text = String::from_utf8_lossy(text);
    let text = text.trim_end_matches('\0');
    let so = format!("SO:{}", order.as_str());

    let mut out = String::with_capacity(text.len() + 32);
    let mut saw_hd = false;
    for line in text.lines().filter(|l| !l.is_empty()) {
        if line.starts_with("@HD") && !saw_hd {
            saw_hd = true;
            let mut fields: Vec<&str> = line
                .split('\t')
                .filter(|f| !f.starts_with("SO:") && !f.starts_with("GO:"))
                .collect();
            fields.push(&so);
            out.push_str(&fields.join("\t"));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    if !saw_hd {
        out.insert_str(0, &format!("@HD\tVN:1.6\t{so}\n"));
    }
    out
}

/// Output header derived from an input header, declaring the given sort order.
pub fn sorted_header(template: &HeaderView, order: SortOrder) -> Header {
    let text = with_sort_order(template.as_bytes(), order);
    Header::from_template(&HeaderView::from_bytes(text.as_bytes()))
}

/// Build a minimal header from `(name, length)` reference pairs.
pub fn build_hts_header(references: &[(&str, u64)], order: Option<SortOrder>) -> Header {
    let mut header = Header::new();
    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", "1.6");
    if let Some(order) = order {
        hd.push_tag(b"SO", order.as_str());
    }
    header.push_record(&hd);
    for (name, len) in references {
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", name);
        sq.push_tag(b"LN", len);
        header.push_record(&sq);
    }
    header
}
