use afl::*;

use h264_syntax::H264Parser;

fn main() {
    fuzz!(|data: &[u8]| {
        let mut parser = H264Parser::new();
        parser.push(data);

        // Errors are fine, panics are not; keep draining past bad NALUs.
        loop {
            match parser.next_nalu() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {}
            }
        }
    })
}
