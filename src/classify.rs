use std::ops::Range;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::debug;

use crate::domain::{Instrument, ProductType};
use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdForm {
    Long,
    Short,
}

struct IdFormRule {
    form: IdForm,
    marker: &'static str,
    sub: Range<usize>,
    subsub: Range<usize>,
}

// Long must come first: every long id also starts with the short marker.
const ID_FORM_RULES: [IdFormRule; 2] = [
    IdFormRule {
        form: IdForm::Long,
        marker: "0000",
        sub: 7..9,
        subsub: 7..11,
    },
    IdFormRule {
        form: IdForm::Short,
        marker: "000",
        sub: 6..9,
        subsub: 6..11,
    },
];

const PRODUCT_TYPE_GLOBS: [(&str, ProductType); 2] = [
    ("*_if*_trr3.*", ProductType::Data),
    ("*_de*_ddr1.*", ProductType::Ddr),
];

static PRODUCT_TYPE_RULES: LazyLock<Vec<(Regex, ProductType)>> = LazyLock::new(|| {
    PRODUCT_TYPE_GLOBS
        .iter()
        .map(|(glob, product_type)| (Regex::new(&glob_to_regex(glob)).unwrap(), *product_type))
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDir {
    pub instrument: Instrument,
    pub product_type: ProductType,
    segments: [String; 3],
}

impl ProductDir {
    pub fn segments(&self) -> &[String; 3] {
        &self.segments
    }

    pub fn relative_path(&self) -> Utf8PathBuf {
        self.segments.iter().collect()
    }

    pub fn under(&self, base: &Utf8Path) -> Utf8PathBuf {
        base.join(self.relative_path())
    }
}

pub fn classify(filename: &str) -> Result<ProductDir, FetchError> {
    debug!(filename, "try to organize");
    let lower = filename.to_lowercase();

    let instrument = Instrument::ALL
        .into_iter()
        .find(|instrument| lower.starts_with(instrument.code()))
        .ok_or_else(|| FetchError::UnknownInstrument(filename.to_string()))?;

    let rule = ID_FORM_RULES
        .iter()
        .find(|rule| lower.starts_with(&format!("{}{}", instrument.code(), rule.marker)))
        .ok_or_else(|| FetchError::UnrecognizedObservationId(filename.to_string()))?;

    let product_type = PRODUCT_TYPE_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(&lower))
        .map(|(_, product_type)| *product_type)
        .ok_or_else(|| FetchError::UnmatchedProductType(filename.to_string()))?;

    let stem = Utf8Path::new(filename).file_stem().unwrap_or(filename);
    let prefix = instrument.code().to_uppercase();
    let segments = [
        format!("{prefix}{}", slice_chars(stem, &rule.sub).to_uppercase()),
        format!("{prefix}{}", slice_chars(stem, &rule.subsub).to_uppercase()),
        product_type.dir_name().to_string(),
    ];
    debug!(filename, form = ?rule.form, dir = %segments.join("/"), "classified");

    Ok(ProductDir {
        instrument,
        product_type,
        segments,
    })
}

pub fn target_path(base: &Utf8Path, filename: &str) -> Result<Utf8PathBuf, FetchError> {
    Ok(classify(filename)?.under(base).join(filename))
}

// Out-of-range bounds clamp to the stem, so short stems give short segments.
fn slice_chars(value: &str, range: &Range<usize>) -> String {
    value
        .chars()
        .skip(range.start)
        .take(range.end.saturating_sub(range.start))
        .collect()
}

fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::from("(?s)^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    pattern
}
