use h264_syntax::{H264Parser, NaluPayload};
use std::fs::File;
use std::io::Read;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <h264_file>", args[0]);
        return Ok(());
    }

    let mut file = File::open(&args[1])?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let mut parser = H264Parser::new();
    parser.push(&buffer);

    let mut nalu_count = 0;
    let mut slice_count = 0;

    loop {
        match parser.next_nalu() {
            Ok(Some(nalu)) => {
                nalu_count += 1;
                println!("NALU {}: {:?}", nalu_count, nalu.nal.nal_type);

                match nalu.payload {
                    NaluPayload::Sps(sps) => {
                        println!("  Resolution: {}x{}", sps.width, sps.height);
                        println!("  Profile: {}, Level: {}", sps.profile_idc, sps.level_idc);
                    }
                    NaluPayload::Pps(pps) => {
                        println!(
                            "  Entropy coding: {}",
                            if pps.entropy_coding_mode_flag {
                                "CABAC"
                            } else {
                                "CAVLC"
                            }
                        );
                    }
                    NaluPayload::Slice(slice) => {
                        slice_count += 1;
                        println!(
                            "  Slice type: {:?}, frame_num: {}, {} macroblocks",
                            slice.header.slice_type,
                            slice.header.frame_num,
                            slice.macroblocks.len()
                        );
                    }
                    NaluPayload::Aud(aud) => {
                        println!("  Primary pic type: {}", aud.primary_pic_type);
                    }
                    NaluPayload::Other => {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("  NALU parse error: {}", e);
            }
        }
    }

    println!("\nSummary:");
    println!("Total NALUs: {}", nalu_count);
    println!("Parsed slices: {}", slice_count);

    Ok(())
}
