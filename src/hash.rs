use std::collections::BTreeMap;

use crate::constants::HASH_MULTIPLIER;
use crate::result::Result;
use crate::stream::{FileReader, FileWriter};

/// Hash slot of a label. Every label table section (LBL1, CLB1, ALB1, SLB1)
/// buckets its records with this function.
pub fn calculate_hash(label: &str, slot_count: u32) -> u32 {
    let mut hash: u32 = 0;
    for ch in label.chars() {
        hash = hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(ch as u32);
    }
    hash % slot_count
}

/// Reads a label table section. Returns the labels sorted by item index along
/// with the slot count, which varies per title and must be preserved.
pub fn read_labels(reader: &mut FileReader) -> Result<(Vec<(u32, String)>, u32)> {
    let data_start = reader.position();
    let slot_count = reader.read_u32()?;

    let mut labels = BTreeMap::new();
    for _ in 0..slot_count {
        let label_count = reader.read_u32()?;
        let offset = reader.read_u32()?;
        let next_slot = reader.position();

        reader.seek(data_start + u64::from(offset));
        for _ in 0..label_count {
            let length = reader.read_u8()?;
            let label = reader.read_str_len(length as usize)?;
            let item_index = reader.read_u32()?;
            labels.insert(item_index, label);
        }

        reader.seek(next_slot);
    }

    Ok((labels.into_iter().collect(), slot_count))
}

/// Writes a label table: the slot directory with pre-computed record offsets,
/// then each bucket's records. Bucket order within a slot is the insertion
/// order of `labels`.
pub fn write_labels(writer: &mut FileWriter, labels: &[&str], slot_count: u32) -> Result<()> {
    writer.write_u32(slot_count)?;

    let mut buckets: Vec<Vec<(u32, &str)>> = vec![Vec::new(); slot_count as usize];
    for (index, &label) in labels.iter().enumerate() {
        buckets[calculate_hash(label, slot_count) as usize].push((index as u32, label));
    }

    // Offsets are relative to the section payload start, past the directory.
    let mut record_offset = slot_count * 8 + 4;
    for bucket in &buckets {
        writer.write_u32(bucket.len() as u32)?;
        writer.write_u32(record_offset)?;
        for (_, label) in bucket {
            record_offset += label.len() as u32 + 5;
        }
    }

    for bucket in &buckets {
        for (index, label) in bucket {
            writer.write_u8(label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
            writer.write_u32(*index)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Encoding;

    #[test]
    fn hash_vectors() {
        assert_eq!(calculate_hash("Hello", 101), 25);
        assert_eq!(calculate_hash("", 101), 0);
        assert_eq!(calculate_hash("abcdefghij", 101), 19);
    }

    #[test]
    fn labels_roundtrip_sorted_by_index() {
        let labels = ["Msg_00", "Msg_01", "Other"];
        let mut writer = FileWriter::new(Encoding::Utf16, false);
        write_labels(&mut writer, &labels, 101).unwrap();

        let mut reader = FileReader::new(writer.into_bytes());
        let (read, slot_count) = read_labels(&mut reader).unwrap();
        assert_eq!(slot_count, 101);
        let expected: Vec<(u32, String)> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (i as u32, label.to_string()))
            .collect();
        assert_eq!(read, expected);
    }

    #[test]
    fn colliding_labels_share_a_slot() {
        // Both labels land in slot 0 for a single-slot table.
        let labels = ["A", "B"];
        let mut writer = FileWriter::new(Encoding::Utf16, false);
        write_labels(&mut writer, &labels, 1).unwrap();

        let mut reader = FileReader::new(writer.into_bytes());
        let (read, _) = read_labels(&mut reader).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0], (0, "A".to_string()));
        assert_eq!(read[1], (1, "B".to_string()));
    }
}
