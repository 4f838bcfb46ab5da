//! Operator commands
//!
//! One command per line on stdin:
//!
//! | command | action |
//! |---|---|
//! | `polygon lon,lat lon,lat lon,lat ...` | draw and activate a polygon |
//! | `draw` | start drawing a polygon |
//! | `vertex lon,lat` | add a vertex while drawing |
//! | `finish` | close and activate the drawn polygon |
//! | `rings` | arm alert rings |
//! | `center lon,lat` | place armed rings |
//! | `clear` | remove the active region |
//! | `threshold <ft>` | change the alert altitude threshold |
//! | `status` | print the alert summary |
//! | `aircraft <id>` | print the detail card of one displayed aircraft |
//! | `help` | list commands |

use homebase_common::geo::GeoPoint;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::WatchError;

pub const HELP: &str = "commands: polygon lon,lat ... | draw | vertex lon,lat | finish | rings | center lon,lat | clear | threshold <ft> | status | aircraft <id> | help";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Polygon(Vec<GeoPoint>),
    Draw,
    Vertex(GeoPoint),
    Finish,
    Rings,
    Center(GeoPoint),
    Clear,
    /// New threshold in feet
    Threshold(f64),
    Status,
    /// Detail card for a hex id (lowercased)
    Aircraft(String),
    Help,
}

impl FromStr for Command {
    type Err = WatchError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(WatchError::Command("empty line".to_string()));
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("polygon", points) if !points.is_empty() => Command::Polygon(
                points
                    .iter()
                    .map(|p| parse_point(p))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            ("draw", []) => Command::Draw,
            ("vertex", [point]) => Command::Vertex(parse_point(point)?),
            ("finish", []) => Command::Finish,
            ("rings", []) => Command::Rings,
            ("center", [point]) => Command::Center(parse_point(point)?),
            ("clear", []) => Command::Clear,
            ("threshold", [feet]) => Command::Threshold(parse_feet(feet)?),
            ("status", []) => Command::Status,
            ("aircraft", [id]) => Command::Aircraft(id.to_ascii_lowercase()),
            ("help", []) => Command::Help,
            _ => return Err(WatchError::Command(format!("unrecognized: {}", line.trim()))),
        };
        Ok(command)
    }
}

/// `lon,lat`
pub fn parse_point(text: &str) -> Result<GeoPoint, WatchError> {
    let invalid = || WatchError::Command(format!("expected lon,lat but got '{}'", text));

    let (lon, lat) = text.split_once(',').ok_or_else(invalid)?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;

    let point = GeoPoint::new(lon, lat);
    if !point.is_valid() {
        return Err(invalid());
    }
    Ok(point)
}

fn parse_feet(text: &str) -> Result<f64, WatchError> {
    match text.parse::<f64>() {
        Ok(ft) if ft.is_finite() && ft >= 0.0 => Ok(ft),
        _ => Err(WatchError::Command(format!(
            "threshold must be a non-negative number of feet, got '{}'",
            text
        ))),
    }
}

/// Forward parsed stdin lines until EOF or the receiver goes away
pub fn spawn_stdin_reader(tx: mpsc::Sender<Command>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("{}", e);
                        println!("{}", HELP);
                    }
                },
                Ok(None) => {
                    debug!("stdin closed, operator commands disabled");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polygon() {
        let command: Command = "polygon -85.6,42.8 -85.4,42.8 -85.5,43.0".parse().unwrap();
        assert_eq!(
            command,
            Command::Polygon(vec![
                GeoPoint::new(-85.6, 42.8),
                GeoPoint::new(-85.4, 42.8),
                GeoPoint::new(-85.5, 43.0),
            ])
        );
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!("draw".parse::<Command>().unwrap(), Command::Draw);
        assert_eq!(" FINISH ".parse::<Command>().unwrap(), Command::Finish);
        assert_eq!("rings".parse::<Command>().unwrap(), Command::Rings);
        assert_eq!("clear".parse::<Command>().unwrap(), Command::Clear);
        assert_eq!("status".parse::<Command>().unwrap(), Command::Status);
        assert_eq!(
            "center -85.5228,42.8808".parse::<Command>().unwrap(),
            Command::Center(GeoPoint::new(-85.5228, 42.8808))
        );
        assert_eq!(
            "threshold 1500".parse::<Command>().unwrap(),
            Command::Threshold(1500.0)
        );
    }

    #[test]
    fn test_parse_aircraft() {
        assert_eq!(
            "aircraft A1B2C3".parse::<Command>().unwrap(),
            Command::Aircraft("a1b2c3".to_string())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Command>().is_err());
        assert!("polygon".parse::<Command>().is_err());
        assert!("vertex 1".parse::<Command>().is_err());
        assert!("vertex 1,95".parse::<Command>().is_err());
        assert!("threshold -5".parse::<Command>().is_err());
        assert!("threshold lots".parse::<Command>().is_err());
        assert!("draw now".parse::<Command>().is_err());
        assert!("launch".parse::<Command>().is_err());
        assert!("aircraft".parse::<Command>().is_err());
        assert!("aircraft a1 b2".parse::<Command>().is_err());
    }
}
