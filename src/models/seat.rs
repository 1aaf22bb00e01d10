use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database identity of one seat row.
pub type SeatId = i64;

/// Fixed set of hold (and legacy kill) names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HoldName {
    Red,
    Green,
    Blue,
    Orange,
}

impl HoldName {
    pub const ALL: [HoldName; 4] = [HoldName::Red, HoldName::Green, HoldName::Blue, HoldName::Orange];

    pub fn as_str(&self) -> &'static str {
        match self {
            HoldName::Red => "Red",
            HoldName::Green => "Green",
            HoldName::Blue => "Blue",
            HoldName::Orange => "Orange",
        }
    }
}

impl fmt::Display for HoldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HoldName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HoldName::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| format!("unknown hold name '{s}'"))
    }
}

/// Primary sale status as stored on the seat row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    #[default]
    Free,
    ReservedByToken,
    Booked,
    Resale,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Free => "free",
            SeatStatus::ReservedByToken => "reserved_by_token",
            SeatStatus::Booked => "booked",
            SeatStatus::Resale => "resale",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SeatStatus::Free),
            "reserved_by_token" => Ok(SeatStatus::ReservedByToken),
            "booked" => Ok(SeatStatus::Booked),
            "resale" => Ok(SeatStatus::Resale),
            other => Err(format!("unknown seat status '{other}'")),
        }
    }
}

/// Display-only layout hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SeatingType {
    #[default]
    Row,
    Table,
    Booth,
}

impl SeatingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatingType::Row => "Row",
            SeatingType::Table => "Table",
            SeatingType::Booth => "Booth",
        }
    }
}

impl FromStr for SeatingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Row" => Ok(SeatingType::Row),
            "Table" => Ok(SeatingType::Table),
            "Booth" => Ok(SeatingType::Booth),
            other => Err(format!("unknown seating type '{other}'")),
        }
    }
}

/// (ticket type, section, row, seat number): identifies the same physical
/// seat across every listing that sells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralKey {
    pub ticket_type: String,
    pub section: String,
    pub row: String,
    pub seat: i32,
}

impl fmt::Display for StructuralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.ticket_type, self.section, self.row, self.seat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: SeatId,
    pub event_id: String,
    pub ticket_type: String,
    pub section: String,
    pub row: String,
    pub seat: i32,
    pub seating_type: SeatingType,
    pub direct_hold_name: Option<HoldName>,
    /// Legacy field, only written through the kill workflow.
    pub kill_name: Option<HoldName>,
    pub not_for_sale: bool,
    pub status: SeatStatus,
    pub is_resale: bool,
    pub is_reservation: bool,
}

impl Seat {
    pub fn key(&self) -> StructuralKey {
        StructuralKey {
            ticket_type: self.ticket_type.clone(),
            section: self.section.clone(),
            row: self.row.clone(),
            seat: self.seat,
        }
    }

    /// Whether the direct fields are all at their reset defaults.
    pub fn is_pristine(&self) -> bool {
        self.direct_hold_name.is_none()
            && self.kill_name.is_none()
            && !self.not_for_sale
            && self.status == SeatStatus::Free
            && !self.is_resale
            && !self.is_reservation
    }
}

/// Row inserted during inventory seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSeat {
    pub event_id: String,
    pub key: StructuralKey,
    pub seating_type: SeatingType,
}

/// Partial update of a seat's direct fields. `None` leaves the column alone;
/// the nested options on hold/kill distinguish "clear" from "untouched".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatPatch {
    pub direct_hold_name: Option<Option<HoldName>>,
    pub kill_name: Option<Option<HoldName>>,
    pub not_for_sale: Option<bool>,
    pub status: Option<SeatStatus>,
    pub is_resale: Option<bool>,
    pub is_reservation: Option<bool>,
}

impl SeatPatch {
    pub fn is_empty(&self) -> bool {
        *self == SeatPatch::default()
    }

    pub fn apply(&self, seat: &mut Seat) {
        if let Some(hold) = self.direct_hold_name {
            seat.direct_hold_name = hold;
        }
        if let Some(kill) = self.kill_name {
            seat.kill_name = kill;
        }
        if let Some(nfs) = self.not_for_sale {
            seat.not_for_sale = nfs;
        }
        if let Some(status) = self.status {
            seat.status = status;
        }
        if let Some(resale) = self.is_resale {
            seat.is_resale = resale;
        }
        if let Some(reservation) = self.is_reservation {
            seat.is_reservation = reservation;
        }
    }

    pub fn applied_to(&self, seat: &Seat) -> Seat {
        let mut next = seat.clone();
        self.apply(&mut next);
        next
    }
}
