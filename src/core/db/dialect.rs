//! SQL text for each backend.
//!
//! Both dialects produce the same column names and orderings. Ages are whole
//! years between the birthday and a reference date bound as a parameter.

use super::Driver;

/// One of the four fixed report queries.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticalQuery {
    pub name: &'static str,
    pub sql: &'static str,
    /// Whether the query binds the reference date as its only parameter.
    pub uses_reference_date: bool,
}

/// Statement set for one backend.
#[derive(Debug)]
pub struct Statements {
    pub insert_room: &'static str,
    pub insert_student: &'static str,
    pub indexes: [(&'static str, &'static str); 3],
    pub queries: [AnalyticalQuery; 4],
}

pub fn statements(driver: Driver) -> &'static Statements {
    match driver {
        Driver::Postgres => &POSTGRES,
        Driver::Sqlite => &SQLITE,
    }
}

const INDEXES: [(&str, &str); 3] = [
    (
        "idx_room_name",
        "CREATE INDEX IF NOT EXISTS idx_room_name ON room(\"name\")",
    ),
    (
        "idx_student_birthday",
        "CREATE INDEX IF NOT EXISTS idx_student_birthday ON student(birthday)",
    ),
    (
        "idx_student_room",
        "CREATE INDEX IF NOT EXISTS idx_student_room ON student(room)",
    ),
];

static POSTGRES: Statements = Statements {
    insert_room: "INSERT INTO room(id, \"name\") VALUES ($1::BIGINT, $2::TEXT)",
    insert_student: "INSERT INTO student(id, birthday, \"name\", room, sex) \
                     VALUES ($1::BIGINT, $2::DATE, $3::TEXT, $4::BIGINT, $5::TEXT)",
    indexes: INDEXES,
    queries: [
        AnalyticalQuery {
            name: "occupancy",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         COUNT(s.id) AS students_quantity
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  GROUP BY r.id, r.\"name\"
                  ORDER BY r.id",
            uses_reference_date: false,
        },
        AnalyticalQuery {
            name: "youngest_average",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         COUNT(s.id) AS students_quantity,
                         AVG(EXTRACT(YEAR FROM age($1::DATE, s.birthday))::INTEGER)::INTEGER AS average_age
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  GROUP BY r.id, r.\"name\"
                  ORDER BY average_age ASC, r.id ASC
                  LIMIT 5",
            uses_reference_date: true,
        },
        AnalyticalQuery {
            name: "widest_age_spread",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         COUNT(s.id) AS students_quantity,
                         MAX(EXTRACT(YEAR FROM age($1::DATE, s.birthday))::INTEGER)
                           - MIN(EXTRACT(YEAR FROM age($1::DATE, s.birthday))::INTEGER) AS stud_age_diff
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  GROUP BY r.id, r.\"name\"
                  ORDER BY stud_age_diff DESC, students_quantity ASC, r.id ASC
                  LIMIT 5",
            uses_reference_date: true,
        },
        AnalyticalQuery {
            name: "mixed_gender",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         STRING_AGG(s.sex::TEXT, ', ' ORDER BY s.sex::TEXT) AS genders_in_room
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  WHERE UPPER(s.sex::TEXT) IN ('M', 'F')
                  GROUP BY r.id, r.\"name\"
                  HAVING COUNT(DISTINCT UPPER(s.sex::TEXT)) = 2
                  ORDER BY r.id",
            uses_reference_date: false,
        },
    ],
};

// Whole years from birthday to ?1: year difference, minus one while the
// reference month-day is still before the birthday's.
static SQLITE: Statements = Statements {
    insert_room: "INSERT INTO room(id, \"name\") VALUES (?1, ?2)",
    insert_student: "INSERT INTO student(id, birthday, \"name\", room, sex) VALUES (?1, ?2, ?3, ?4, ?5)",
    indexes: INDEXES,
    queries: [
        AnalyticalQuery {
            name: "occupancy",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         COUNT(s.id) AS students_quantity
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  GROUP BY r.id, r.\"name\"
                  ORDER BY r.id",
            uses_reference_date: false,
        },
        AnalyticalQuery {
            name: "youngest_average",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         COUNT(s.id) AS students_quantity,
                         CAST(ROUND(AVG(
                             CAST(strftime('%Y', ?1) AS INTEGER) - CAST(strftime('%Y', s.birthday) AS INTEGER)
                             - (strftime('%m-%d', ?1) < strftime('%m-%d', s.birthday))
                         )) AS INTEGER) AS average_age
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  GROUP BY r.id, r.\"name\"
                  ORDER BY average_age ASC, r.id ASC
                  LIMIT 5",
            uses_reference_date: true,
        },
        AnalyticalQuery {
            name: "widest_age_spread",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         COUNT(s.id) AS students_quantity,
                         MAX(
                             CAST(strftime('%Y', ?1) AS INTEGER) - CAST(strftime('%Y', s.birthday) AS INTEGER)
                             - (strftime('%m-%d', ?1) < strftime('%m-%d', s.birthday))
                         ) - MIN(
                             CAST(strftime('%Y', ?1) AS INTEGER) - CAST(strftime('%Y', s.birthday) AS INTEGER)
                             - (strftime('%m-%d', ?1) < strftime('%m-%d', s.birthday))
                         ) AS stud_age_diff
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  GROUP BY r.id, r.\"name\"
                  ORDER BY stud_age_diff DESC, students_quantity ASC, r.id ASC
                  LIMIT 5",
            uses_reference_date: true,
        },
        AnalyticalQuery {
            name: "mixed_gender",
            sql: "SELECT r.id AS room_id,
                         r.\"name\" AS room_name,
                         group_concat(s.sex, ', ' ORDER BY s.sex) AS genders_in_room
                  FROM room AS r
                      INNER JOIN student AS s ON r.id = s.room
                  WHERE UPPER(s.sex) IN ('M', 'F')
                  GROUP BY r.id, r.\"name\"
                  HAVING COUNT(DISTINCT UPPER(s.sex)) = 2
                  ORDER BY r.id",
            uses_reference_date: false,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{query, Gateway, SqliteGateway};
    use crate::core::Value;
    use chrono::NaiveDate;

    #[test]
    fn test_dialects_share_query_shape() {
        let pg = statements(Driver::Postgres);
        let lite = statements(Driver::Sqlite);
        for (a, b) in pg.queries.iter().zip(lite.queries.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.uses_reference_date, b.uses_reference_date);
        }
        assert!(pg.indexes.iter().all(|(_, sql)| sql.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_inserts_are_parameterized() {
        for driver in [Driver::Postgres, Driver::Sqlite] {
            let s = statements(driver);
            assert!(!s.insert_room.contains('\''));
            assert!(!s.insert_student.contains('\''));
        }
    }

    #[test]
    fn test_postgres_averages_integer_ages() {
        // AVG over int4 yields numeric, whose cast rounds half away from zero
        // on every server version.
        let sql = statements(Driver::Postgres).queries[1].sql;
        assert!(sql.contains("AVG(EXTRACT(YEAR FROM age($1::DATE, s.birthday))::INTEGER)::INTEGER"));
    }

    #[test]
    fn test_sqlite_average_rounds_half_away_from_zero() {
        let mut gateway = SqliteGateway::open(":memory:").unwrap();
        gateway
            .connection()
            .execute_batch(
                "CREATE TABLE room (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
                 CREATE TABLE student (id INTEGER PRIMARY KEY, birthday DATE NOT NULL,
                     name TEXT NOT NULL, room INTEGER NOT NULL, sex TEXT NOT NULL);
                 INSERT INTO room VALUES (1, 'Room A');
                 INSERT INTO student VALUES (1, '2002-01-01', 'A', 1, 'F');
                 INSERT INTO student VALUES (2, '2001-01-01', 'B', 1, 'M');",
            )
            .unwrap();

        let reference = Value::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let sql = statements(gateway.driver()).queries[1].sql;
        let result = query(&mut gateway, sql, &[reference]).unwrap();

        // Ages 22 and 23
        assert_eq!(result.get(0, "average_age"), Some(&Value::Integer(23)));
    }
}
