use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipetteError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Title {
    #[default]
    Mr,
    Mrs,
    Ms,
    Baby,
    Ven,
    Dr,
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Title::Mr => write!(f, "Mr"),
            Title::Mrs => write!(f, "Mrs"),
            Title::Ms => write!(f, "Ms"),
            Title::Baby => write!(f, "Baby"),
            Title::Ven => write!(f, "Ven"),
            Title::Dr => write!(f, "Dr"),
        }
    }
}

/// Age in whole years plus the months since the last birthday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Age {
    pub years: u32,
    pub months: u32,
}

impl Age {
    /// Age on `today` of someone born on `dob`. A date of birth in the future
    /// is an error.
    pub fn from_dob(dob: NaiveDate, today: NaiveDate) -> Result<Self, PipetteError> {
        if dob > today {
            return Err(PipetteError::InvalidInput {
                input: dob.to_string(),
                reason: format!("date of birth is after {today}"),
            });
        }

        let mut months = (today.year() - dob.year()) * 12 + today.month() as i32
            - dob.month() as i32;
        if today.day() < dob.day() {
            months -= 1;
        }
        let months = months.max(0) as u32;
        Ok(Self {
            years: months / 12,
            months: months % 12,
        })
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} years {} months", self.years, self.months)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: Title,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub age: Age,
    #[serde(default)]
    pub phone: String,
}

impl Patient {
    pub fn new(title: Title, name: &str) -> Self {
        Self {
            name: name.to_string(),
            email: String::new(),
            title,
            address: String::new(),
            gender: String::new(),
            dob: None,
            age: Age::default(),
            phone: String::new(),
        }
    }

    /// Set the date of birth and recompute the age from it.
    pub fn with_dob(mut self, dob: NaiveDate, today: NaiveDate) -> Result<Self, PipetteError> {
        self.age = Age::from_dob(dob, today)?;
        self.dob = Some(dob);
        Ok(self)
    }

    /// Name as printed on reports and invoices, e.g. `Mrs Perera`.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.title, self.name.trim())
    }
}
