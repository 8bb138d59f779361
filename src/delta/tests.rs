use super::*;

#[test]
fn parses_delta_insert_op() {
    let op = DeltaOp::deserialize(&mut &[0x3, 0xa, 0xb, 0xc][..]).unwrap();
    assert_eq!(op, DeltaOp::Insert(vec![0xa, 0xb, 0xc]));
}

#[test]
fn parses_delta_copy_op() {
    let op = DeltaOp::deserialize(&mut &[0b11111111, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd][..]).unwrap();
    // little endian encoding
    assert_eq!(op, DeltaOp::Copy(0x67452301, 0xcdab89));
}

#[test]
fn zero_length_copy_means_the_0x10000_default() {
    let op = DeltaOp::deserialize(&mut &[0x80][..]).unwrap();
    assert_eq!(op, DeltaOp::Copy(0, 0x10000));
}

#[test]
fn rejects_reserved_zero_instruction_byte() {
    assert!(DeltaOp::deserialize(&mut &[0x00][..]).is_err());
}

/// mirrors spec section 8 scenario 3: a 512-byte base, a script that
/// copies 4096 bytes from offset 0x0200 in the base.
#[test]
fn expands_copy_instruction_matching_spec_scenario() {
    let base: Vec<u8> = (0..4608u32).map(|i| (i % 251) as u8).collect();

    let mut bytes = vec![];
    // source_size = 512 = 0x200 -> varint [0x80, 0x04]
    bytes.extend_from_slice(&[0x80, 0x04]);
    // target_size = 4096 = 0x1000 -> varint [0x80, 0x20]
    bytes.extend_from_slice(&[0x80, 0x20]);
    // copy instruction: header bit1 (offset byte 1) + bit5 (size byte 1) set
    bytes.extend_from_slice(&[0b1010_0010, 0x02, 0x10]);

    let delta = Delta::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).unwrap();
    assert_eq!(delta.source_size, 512);
    assert_eq!(delta.target_size, 4096);

    let expanded = delta.expand(&base[..512]).unwrap();
    assert_eq!(expanded.len(), 4096);
    assert_eq!(expanded, base[0x0200..0x1200]);
}

#[test]
fn rejects_copy_past_end_of_base() {
    // source_size=1, target_size=1, then a copy instruction reading 2
    // bytes at offset 0 from a 1-byte base
    let mut bytes = vec![0x01, 0x01];
    bytes.extend_from_slice(&[0b1000_0011, 0x00, 0x02]);
    let delta = Delta::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).unwrap();
    assert!(delta.expand(&[0xffu8][..]).is_err());
}
