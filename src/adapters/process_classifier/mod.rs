//! Classifier backed by a long-running helper process
//!
//! The helper speaks a line protocol over stdio. On start it prints one JSON
//! line carrying its class table:
//!
//! ```text
//! {"names": ["person", "bicycle", "car", ...]}
//! ```
//!
//! For every frame it receives a JSON header line followed by exactly
//! `width * height * 3` bytes of packed RGB24:
//!
//! ```text
//! {"index": 120, "width": 1280, "height": 720}
//! ```
//!
//! and answers with one line, either detections or an error for that frame:
//!
//! ```text
//! {"detections": [{"class_id": 15, "confidence": 0.91, "bbox": [10, 20, 200, 180]}]}
//! {"error": "CUDA out of memory"}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::{BoundingBox, ClassNames, Detection, Frame};
use crate::error::{SightclipError, SightclipResult};
use crate::ports::{Classifier, ClassifierFactory};

#[derive(Debug, Deserialize)]
struct Handshake {
    names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FrameHeader {
    index: u64,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply {
    Detections { detections: Vec<RawDetection> },
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    class_id: u32,
    confidence: f32,
    #[serde(default)]
    bbox: Option<[f32; 4]>,
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        let detection = Detection::new(raw.class_id, raw.confidence);
        match raw.bbox {
            Some([x1, y1, x2, y2]) => detection.with_bbox(BoundingBox { x1, y1, x2, y2 }),
            None => detection,
        }
    }
}

/// Spawns one helper process per job
#[derive(Debug, Clone)]
pub struct ProcessClassifierFactory {
    command: Vec<String>,
}

impl ProcessClassifierFactory {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl ClassifierFactory for ProcessClassifierFactory {
    fn create(&self) -> SightclipResult<Box<dyn Classifier>> {
        Ok(Box::new(ProcessClassifier::spawn(&self.command)?))
    }
}

pub struct ProcessClassifier {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    names: ClassNames,
    line: String,
}

impl ProcessClassifier {
    pub fn spawn(command: &[String]) -> SightclipResult<Self> {
        let (program, args) = command.split_first().ok_or_else(|| SightclipError::Classifier {
            message: "classifier command is empty".to_string(),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SightclipError::Classifier {
                message: format!("failed to start {}: {}", program, e),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(SightclipError::Classifier {
                message: "classifier stdio unavailable".to_string(),
            });
        };

        let mut classifier = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            names: ClassNames::default(),
            line: String::new(),
        };
        let handshake: Handshake = serde_json::from_str(classifier.read_line()?)?;
        classifier.names = ClassNames::new(handshake.names);
        info!(program = %program, classes = classifier.names.len(), "Classifier ready");
        Ok(classifier)
    }

    fn read_line(&mut self) -> SightclipResult<&str> {
        self.line.clear();
        let read = self.stdout.read_line(&mut self.line)?;
        if read == 0 {
            return Err(SightclipError::Classifier {
                message: "classifier closed its output".to_string(),
            });
        }
        Ok(self.line.trim_end())
    }
}

impl Classifier for ProcessClassifier {
    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn classify(&mut self, frame: &Frame) -> SightclipResult<Vec<Detection>> {
        let header = FrameHeader {
            index: frame.index,
            width: frame.width(),
            height: frame.height(),
        };
        let mut message = serde_json::to_vec(&header)?;
        message.push(b'\n');
        self.stdin.write_all(&message)?;
        self.stdin.write_all(frame.as_bytes())?;
        self.stdin.flush()?;

        let reply: Reply = serde_json::from_str(self.read_line()?)?;
        match reply {
            Reply::Detections { detections } => {
                debug!(frame = frame.index, detections = detections.len(), "Frame classified");
                Ok(detections.into_iter().map(Detection::from).collect())
            }
            Reply::Error { error } => Err(SightclipError::Classifier { message: error }),
        }
    }
}

impl Drop for ProcessClassifier {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
