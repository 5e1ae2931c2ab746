mod error;
pub use error::RecordError;

const MIN_FIELDS: usize = 8;
const FIELD_CONTIG: usize = 0;
const FIELD_POS: usize = 1;
const FIELD_REF: usize = 3;
const FIELD_INFO: usize = 7;

/// One tab-separated variant record line. The core only ever inspects fields 0
/// (contig), 1 (pos), 3 (REF) and 7 (INFO) — this is not a general VCF parser, it
/// treats every other field as an opaque string to be carried through verbatim.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<String> = line.split('\t').map(str::to_owned).collect();
        if fields.len() < MIN_FIELDS {
            return Err(RecordError::TooFewFields(fields.len()));
        }
        Ok(Self { fields })
    }

    #[must_use]
    pub fn contig(&self) -> &str {
        &self.fields[FIELD_CONTIG]
    }

    pub fn pos(&self) -> Result<u32, RecordError> {
        self.fields[FIELD_POS].parse().map_err(|_| RecordError::InvalidPos(self.fields[FIELD_POS].clone()))
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        &self.fields[FIELD_REF]
    }

    #[must_use]
    pub fn info(&self) -> &str {
        &self.fields[FIELD_INFO]
    }

    /// A record is a deletion iff its REF allele spans more than one base.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.reference().len() > 1
    }

    /// The `END=<int>` value from INFO, if the record carries a reference block tag.
    ///
    /// Only the leading `;`-separated token is inspected: a record whose INFO
    /// merely contains `END=` somewhere after another tag (e.g. `DP=10;END=500`)
    /// is not a reference block.
    pub fn end_position(&self) -> Result<Option<u32>, RecordError> {
        let Some(tag) = self.info().split(';').next().and_then(|token| token.strip_prefix("END=")) else {
            return Ok(None);
        };
        tag.parse().map(Some).map_err(|_| RecordError::InvalidEnd(tag.to_owned()))
    }

    /// `true` if this record carries an `END=` reference-block tag.
    pub fn is_reference_block(&self) -> Result<bool, RecordError> {
        Ok(self.end_position()?.is_some())
    }

    /// Splice a reference block that straddles a cut: rewrite POS to `new_pos` and
    /// REF to the single base at that position (fetched by the caller).
    #[must_use]
    pub fn with_spliced_start(&self, new_pos: u32, base: u8) -> Self {
        let mut fields = self.fields.clone();
        fields[FIELD_POS] = new_pos.to_string();
        fields[FIELD_REF] = (base as char).to_string();
        Self { fields }
    }

    /// Truncate a reference block at the last record boundary: rewrite its `END=`
    /// tag to `new_end`, leaving every other INFO token untouched.
    #[must_use]
    pub fn with_truncated_end(&self, new_end: u32) -> Self {
        let mut fields = self.fields.clone();
        let rewritten = self.info()
            .split(';')
            .map(|token| if token.starts_with("END=") { format!("END={new_end}") } else { token.to_owned() })
            .collect::<Vec<_>>()
            .join(";");
        fields[FIELD_INFO] = rewritten;
        Self { fields }
    }

    /// Re-join fields with tabs for output.
    #[must_use]
    pub fn to_line(&self) -> String {
        self.fields.join("\t")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> Record {
        Record::parse(line).unwrap()
    }

    #[test]
    fn parses_contig_pos_ref_info() {
        let r = record("chr1\t100\t.\tAT\tA\t.\t.\t.");
        assert_eq!(r.contig(), "chr1");
        assert_eq!(r.pos().unwrap(), 100);
        assert_eq!(r.reference(), "AT");
        assert!(r.is_deletion());
    }

    #[test]
    fn single_base_ref_is_not_a_deletion() {
        let r = record("chr1\t100\t.\tA\tG\t.\t.\t.");
        assert!(!r.is_deletion());
    }

    #[test]
    fn parses_end_tag_from_info() {
        let r = record("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND=999");
        assert_eq!(r.end_position().unwrap(), Some(999));
        assert!(r.is_reference_block().unwrap());
    }

    #[test]
    fn missing_end_tag_is_none() {
        let r = record("chr1\t100\t.\tA\tG\t.\t.\t.");
        assert_eq!(r.end_position().unwrap(), None);
    }

    #[test]
    fn splice_start_rewrites_pos_and_ref() {
        let r = record("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND=999");
        let spliced = r.with_spliced_start(400, b'G');
        assert_eq!(spliced.to_line(), "chr1\t400\t.\tG\t<NON_REF>\t.\t.\tEND=999");
    }

    #[test]
    fn truncate_end_rewrites_only_the_end_token() {
        let r = record("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND=999;DP=10");
        let truncated = r.with_truncated_end(399);
        assert_eq!(truncated.to_line(), "chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND=399;DP=10");
    }

    #[test]
    fn end_tag_is_ignored_unless_leading() {
        let r = record("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tDP=10;END=999");
        assert_eq!(r.end_position().unwrap(), None);
        assert!(!r.is_reference_block().unwrap());
    }

    #[test]
    fn too_few_fields_is_rejected() {
        assert!(Record::parse("chr1\t100").is_err());
    }
}
