// Layout conformance tests for ABI stability across languages.
// These tests assert sizes, alignments, and field offsets for the
// ControlBlock and the BPG header constants. They also print the
// observed values to aid debugging when a mismatch occurs on a given
// platform.
use bpg_link::Link::Structs::Region_Structs::{ControlBlock, CONTROL_BLOCK_SIZE};
use bpg_link::BPG::Structs::Packet_Structs::{
    PacketHeader, BPG_HEADER_SIZE, BPG_PROP_EG_BIT_MASK, META_LEN_SIZE,
};
use memoffset::offset_of;
use std::mem::{align_of, size_of};

#[test]
fn test_control_block_layout() {
    let size = size_of::<ControlBlock>();
    let align = align_of::<ControlBlock>();
    let off_sig_r2h = offset_of!(ControlBlock, sig_r2h);
    let off_len_r2h = offset_of!(ControlBlock, len_r2h);
    let off_sig_h2r = offset_of!(ControlBlock, sig_h2r);
    let off_len_h2r = offset_of!(ControlBlock, len_h2r);

    println!(
        "ControlBlock => size: {size}, expected: {CONTROL_BLOCK_SIZE}, align: {align} (u32 align: {}), offsets: [sig_r2h:{off_sig_r2h}, len_r2h:{off_len_r2h}, sig_h2r:{off_sig_h2r}, len_h2r:{off_len_h2r}]",
        align_of::<u32>()
    );

    assert_eq!(size, CONTROL_BLOCK_SIZE);
    assert_eq!(align, align_of::<u32>());
    assert_eq!(off_sig_r2h, 0);
    assert_eq!(off_len_r2h, 4);
    assert_eq!(off_sig_h2r, 8);
    assert_eq!(off_len_h2r, 12);
}

#[test]
fn test_bpg_header_constants() {
    // tl(2) + prop(4) + target_id(4) + group_id(4) + data_length(4)
    assert_eq!(BPG_HEADER_SIZE, 2 + 4 + 4 + 4 + 4);
    assert_eq!(META_LEN_SIZE, 4);
    assert_eq!(BPG_PROP_EG_BIT_MASK, 1);
}

#[test]
fn test_header_field_positions_on_the_wire() {
    // Byte-literal header so the expectation holds on little-endian hosts.
    let wire: [u8; BPG_HEADER_SIZE] = [
        0x54, 0x58, // tl = "TX"
        0x00, 0x00, 0x00, 0x01, // prop (EG bit set)
        0x00, 0x00, 0x00, 0x03, // target_id = 3
        0x00, 0x00, 0x00, 0x07, // group_id = 7
        0x00, 0x00, 0x00, 0x0E, // data_length = 14
    ];
    let header = PacketHeader::decode(&wire);

    assert_eq!(&header.tl, b"TX");
    assert_eq!(header.prop, 1);
    assert!(header.end_of_group());
    assert_eq!(header.target_id, 3);
    assert_eq!(header.group_id, 7);
    assert_eq!(header.data_length, 14);
}
