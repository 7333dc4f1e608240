//! Canned uploads and model replies for the API tests

/// Smallest payload recognised as PNG: signature plus the IHDR chunk header.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0]);
    bytes
}

pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    bytes.extend_from_slice(b"JFIF\0");
    bytes
}

/// Card image served by the fake provider's file host.
pub fn card_bytes() -> Vec<u8> {
    let mut bytes = png_bytes();
    bytes.extend_from_slice(b"card");
    bytes
}

pub const VALID_PALMS: &str = r#"{
  "isValid": true,
  "errorType": null,
  "details": {
    "isPalm": true,
    "isLeftHand": true,
    "isRightHand": true,
    "isComplete": true,
    "isBright": true,
    "isClear": true,
    "hasPalmLines": true
  },
  "message": "Both palms look good."
}"#;

/// Accepting reply whose diagnostic fields are not the documented types.
pub const VALID_WITH_ODD_DETAILS: &str = r#"{"isValid": true, "details": {"isLeftHand": "unclear", "isBright": 1}, "message": {"text": "fine"}}"#;

pub const TOO_DARK: &str = r#"Here is my check:
{"isValid": false, "errorType": "TOO_DARK", "details": {"isPalm": true, "isBright": false}, "message": "The photo is too dark."}"#;

pub const HAND_MISMATCH: &str =
    r#"{"isValid": false, "errorType": "HAND_MISMATCH", "message": "Hands are swapped."}"#;

/// Analysis reply wrapped in a markdown fence, as models often answer.
pub const STAR_CARTOGRAPHER: &str = r#"```json
{
  "title": "Star Cartographer",
  "shortComment": "Your lines point at the sky ✨",
  "interpretation": "A long, deep head line on both hands.\n\nYou were born to map what others only gaze at."
}
```"#;

pub const STAR_CARTOGRAPHER_TITLE: &str = "Star Cartographer";
