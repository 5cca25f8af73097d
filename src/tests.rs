//! Integration tests for the ISIS backend.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::{hash_password, JwtKeys};
use crate::config::{Config, LogFormat};
use crate::db::{init_database, Repository};
use crate::ingest::OrphanPolicy;
use crate::models::{ApprovalStatus, NewUser, Role};
use crate::{create_router, AppState};

const ADMIN: &str = "admin";
const PASSWORD: &str = "correct horse";
const ROUNDS: u32 = 1000;

const TEACHING_CSV: &str = "code_ue,nom_matiere,niveau,semestre,intervenant,cm_hm,td_hm,tp_hm\n\
                            UE1,Mathematiques,FIE3,S1,Dupont,10,abc,2\n\
                            UE1,Algebre,FIE3,S1,Martin,4,6,0\n";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    /// Bearer token of the bootstrapped admin
    token: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        repo.create_user(&NewUser {
            username: ADMIN.to_string(),
            email: "admin@isis.example".to_string(),
            password_hash: hash_password(PASSWORD, ROUNDS),
            role: Role::Admin,
            approval_status: ApprovalStatus::Approved,
            is_active: true,
        })
        .await
        .expect("Failed to create admin");

        // Create config
        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            jwt_secret: Some("test-secret".to_string()),
            jwt_expiry_hours: 1,
            max_upload_bytes: 1024 * 1024,
            password_rounds: ROUNDS,
            orphan_rows: OrphanPolicy::Drop,
            admin_bootstrap: None,
        };

        let state = AppState {
            repo,
            jwt: Arc::new(JwtKeys::new("test-secret", 1)),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let client = Client::new();
        let token = login(&client, &base_url, ADMIN, PASSWORD)
            .await
            .expect("Admin login failed");

        TestFixture {
            client,
            base_url,
            token,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.token)
    }

    async fn data(&self, path: &str) -> Value {
        let resp = self.get(path).send().await.unwrap();
        assert_eq!(resp.status(), 200, "GET {}", path);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn upload(&self, path: &str, form: Form) -> (u16, Value) {
        let resp = self.post(path).multipart(form).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    /// Register an account with `role`, have the admin approve it, and log in.
    async fn approved_user(&self, username: &str, role: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "username": username,
                "password": PASSWORD,
                "email": format!("{}@isis.example", username),
                "role": role
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let resp = self
            .post(&format!("/api/users/{}/approval", id))
            .json(&json!({"status": "approved"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        login(&self.client, &self.base_url, username, PASSWORD)
            .await
            .expect("Approved user cannot log in")
    }
}

/// Log in and return the bearer token, or the full error body.
async fn login(
    client: &Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<String, (u16, Value)> {
    let resp = client
        .post(format!("{}/api/login", base_url))
        .json(&json!({"username": username, "password": password}))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap();
    match body["data"]["token"].as_str() {
        Some(token) if status == 200 => Ok(token.to_string()),
        _ => Err((status, body)),
    }
}

fn file_form(filename: &str, content: &str) -> Form {
    Form::new().part(
        "file",
        Part::bytes(content.as_bytes().to_vec()).file_name(filename.to_string()),
    )
}

// ==================== PUBLIC ROUTES ====================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = fixture.client.get(fixture.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "running");
}

// ==================== AUTH ====================

#[tokio::test]
async fn test_missing_and_invalid_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/students"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .get(fixture.url("/api/students"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Invalid token");
}

#[tokio::test]
async fn test_check_auth_and_me() {
    let fixture = TestFixture::new().await;

    let session = fixture.data("/api/check-auth").await;
    assert_eq!(session["authenticated"], true);
    assert_eq!(session["username"], ADMIN);
    assert_eq!(session["role"], "admin");

    let me = fixture.data("/api/me").await;
    assert_eq!(me["username"], ADMIN);
    assert!(me["last_login"].is_string());
    assert!(me.get("password_hash").is_none());
    assert!(me["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("manage_users")));

    let resp = fixture.post("/api/logout").send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_wrong_password() {
    let fixture = TestFixture::new().await;

    let (status, body) = login(&fixture.client, &fixture.base_url, ADMIN, "wrong")
        .await
        .unwrap_err();
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_registration_approval_flow() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/register"))
        .json(&json!({
            "username": "claire",
            "password": PASSWORD,
            "email": "claire@isis.example",
            "role": "responsable_admin"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let user = &body["data"];
    assert_eq!(user["approval_status"], "pending");
    assert_eq!(user["is_approved"], false);
    assert_eq!(user["is_active"], false);
    let id = user["id"].as_str().unwrap().to_string();

    // Pending accounts cannot log in
    let (status, body) = login(&fixture.client, &fixture.base_url, "claire", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(status, 403);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("approval"));

    // Admin approves
    let resp = fixture
        .post(&format!("/api/users/{}/approval", id))
        .json(&json!({"status": "approved"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["approval_status"], "approved");
    assert_eq!(body["data"]["is_approved"], true);
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(body["data"]["updated_by"], ADMIN);

    assert!(login(&fixture.client, &fixture.base_url, "claire", PASSWORD)
        .await
        .is_ok());

    let users = fixture.data("/api/users").await;
    assert_eq!(users.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_registration_rejects_bad_input() {
    let fixture = TestFixture::new().await;

    for body in [
        json!({"username": "x", "password": PASSWORD, "email": "x@isis.example", "role": "dean"}),
        json!({"username": ADMIN, "password": PASSWORD, "email": "other@isis.example", "role": "secretaire"}),
        json!({"username": "y", "password": PASSWORD, "email": "admin@isis.example", "role": "secretaire"}),
        json!({"username": "z", "email": "z@isis.example", "role": "secretaire"}),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/register"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{}", body);
        let error: Value = resp.json().await.unwrap();
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_approval_rejects_unknown_status() {
    let fixture = TestFixture::new().await;
    let users = fixture.data("/api/users").await;
    let id = users[0]["id"].as_str().unwrap();

    let resp = fixture
        .post(&format!("/api/users/{}/approval", id))
        .json(&json!({"status": "maybe"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// ==================== PERMISSIONS ====================

#[tokio::test]
async fn test_secretary_cannot_upload() {
    let fixture = TestFixture::new().await;
    let token = fixture.approved_user("sophie", "secretaire").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/students/upload"))
        .bearer_auth(&token)
        .multipart(file_form("etudiants.csv", "Nom,Prénom,niveau,annee\nA,B,FIE1,2024-2025\n"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Reads are allowed
    let resp = fixture
        .client
        .get(fixture.url("/api/students"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // User management is not
    let resp = fixture
        .client
        .get(fixture.url("/api/users"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_research_lead_cannot_edit() {
    let fixture = TestFixture::new().await;
    let token = fixture.approved_user("remi", "responsable_recherche").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/vacataires"))
        .bearer_auth(&token)
        .json(&json!({"last_name": "Roy", "first_name": "Ana", "email": "ana@x.fr"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

// ==================== TEACHING HOURS ====================

#[tokio::test]
async fn test_teaching_upload_groups_rows_into_units() {
    let fixture = TestFixture::new().await;

    let form = file_form("heures.csv", TEACHING_CSV)
        .text("start_year", "2024")
        .text("end_year", "2025");
    let (status, body) = fixture.upload("/api/teaching-hours/upload", form).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["inserted"], 1);

    let units = fixture.data("/api/teaching-hours").await;
    let units = units.as_array().unwrap();
    assert_eq!(units.len(), 1);

    let unit = &units[0];
    assert_eq!(unit["academic_year"], "2024-2025");
    assert_eq!(unit["level"], "FIE3");
    assert_eq!(unit["semester"], "S1");
    assert_eq!(unit["unit"]["code"], "UE1");
    assert_eq!(unit["unit"]["name"], "Mathematiques");

    let subjects = unit["unit"]["subjects"].as_array().unwrap();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0]["name"], "Mathematiques (cours)");
    assert_eq!(subjects[0]["instructor"], "Dupont");
    // Garbage numerics become 0
    assert_eq!(subjects[0]["hours"]["tutorial"]["planned"], 0.0);
    assert_eq!(subjects[1]["hours"]["tutorial"]["planned"], 6.0);
}

#[tokio::test]
async fn test_teaching_upload_twice_keeps_both() {
    let fixture = TestFixture::new().await;

    for _ in 0..2 {
        let form = file_form("heures_FIE3_S1_2024-2025.csv", TEACHING_CSV);
        let (status, _) = fixture.upload("/api/teaching-hours/upload", form).await;
        assert_eq!(status, 200);
    }

    let units = fixture.data("/api/teaching-hours").await;
    let codes: Vec<&str> = units
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["unit"]["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes.len(), 2);
    assert_ne!(codes[0], codes[1]);
    assert!(codes.contains(&"UE1"));
    assert!(codes.iter().all(|c| c.starts_with("UE1")));
}

#[tokio::test]
async fn test_teaching_stats_totals() {
    let fixture = TestFixture::new().await;

    let form = file_form("heures_2024-2025.csv", TEACHING_CSV);
    let (status, _) = fixture.upload("/api/teaching-hours/upload", form).await;
    assert_eq!(status, 200);

    let stats = fixture.data("/api/teaching-hours/stats").await;
    assert_eq!(stats["unit_count"], 1);
    assert_eq!(stats["subject_count"], 2);
    assert_eq!(stats["instructor_count"], 2);
    assert_eq!(stats["totals"]["lecture"]["planned"], 14.0);
    assert_eq!(stats["totals"]["tutorial"]["planned"], 6.0);
    assert_eq!(stats["totals"]["lab"]["planned"], 2.0);
    assert_eq!(stats["grand_total"]["planned"], 22.0);
    assert_eq!(stats["filters"]["level"], "All");

    // A filter matching nothing yields zero totals
    let stats = fixture.data("/api/teaching-hours/stats?level=FIE5").await;
    assert_eq!(stats["unit_count"], 0);
    assert_eq!(stats["grand_total"]["planned"], 0.0);

    let levels = fixture.data("/api/teaching-hours/levels").await;
    assert!(levels.as_array().unwrap().contains(&json!("FIA5")));

    let years = fixture.data("/api/teaching-hours/academic-years").await;
    assert_eq!(years, json!(["2024-2025"]));

    let instructors = fixture.data("/api/teaching-hours/instructors").await;
    assert_eq!(instructors, json!(["Dupont", "Martin"]));
}

#[tokio::test]
async fn test_teaching_scope_delete() {
    let fixture = TestFixture::new().await;

    let form = file_form("heures_2024-2025.csv", TEACHING_CSV);
    fixture.upload("/api/teaching-hours/upload", form).await;

    let scope = json!({"academic_year": "2024-2025", "level": "FIE3", "semester": "S1"});
    let resp = fixture
        .client
        .delete(fixture.url("/api/teaching-hours"))
        .bearer_auth(&fixture.token)
        .json(&scope)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["deleted"], 1);

    // Nothing left to delete
    let resp = fixture
        .client
        .delete(fixture.url("/api/teaching-hours"))
        .bearer_auth(&fixture.token)
        .json(&scope)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// ==================== UPLOAD ERRORS ====================

#[tokio::test]
async fn test_missing_columns_rejects_without_writes() {
    let fixture = TestFixture::new().await;

    let form = file_form("etudiants.csv", "Nom,Prénom,annee\nDupont,Marie,2024-2025\n");
    let (status, body) = fixture.upload("/api/students/upload", form).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "MISSING_COLUMNS");
    assert_eq!(body["error"]["details"]["missing_columns"], json!(["niveau"]));

    let students = fixture.data("/api/students").await;
    assert!(students.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_format() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .upload("/api/students/upload", file_form("etudiants.pdf", "%PDF-1.4"))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_header_only_uploads_are_rejected() {
    let fixture = TestFixture::new().await;

    for (path, filename, header) in [
        (
            "/api/arion/upload",
            "arion.csv",
            "activite,groupe,code_y,niveau,date,duree\n",
        ),
        (
            "/api/vacataires/upload",
            "vacataires.csv",
            "Nom;Prénom;Adresse mail\n",
        ),
        (
            "/api/special-categories/upload",
            "liste_convention.csv",
            "Prénom,Nom,Etablissement,Adresse mail\n",
        ),
    ] {
        let (status, body) = fixture.upload(path, file_form(filename, header)).await;
        assert_eq!(status, 400, "{}", path);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    assert!(fixture.data("/api/arion").await.as_array().unwrap().is_empty());
    assert!(fixture.data("/api/vacataires").await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .upload("/api/students/upload", Form::new().text("year", "2024"))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "No file part in the request");
}

// ==================== STUDENTS ====================

#[tokio::test]
async fn test_student_upload_upserts_and_stats() {
    let fixture = TestFixture::new().await;
    let csv = "Nom,Prénom,Genre,niveau,annee,Boursier(ère),Nationalité,Ville\n\
               Dupont,Marie,Féminin,FIE3,2023-2024,Oui,Française,Lyon\n\
               Diallo,Amadou,Masculin,FIE3,2023-2024,Non,Sénégalaise,Paris\n\
               Petit,Jean,Masculin,FIE4,2023-2024,Non,Française,Nice\n";

    let (_, body) = fixture
        .upload("/api/students/upload", file_form("etudiants.csv", csv))
        .await;
    assert_eq!(body["data"]["inserted"], 3);

    let (_, body) = fixture
        .upload("/api/students/upload", file_form("etudiants.csv", csv))
        .await;
    assert_eq!(body["data"]["inserted"], 0);
    assert_eq!(body["data"]["updated"], 3);

    let students = fixture.data("/api/students?level=FIE3").await;
    assert_eq!(students.as_array().unwrap().len(), 2);

    let stats = fixture.data("/api/students/stats").await;
    assert_eq!(stats["scholarship"]["holders"], 1);
    assert_eq!(stats["foreign"]["total_foreign"], 1);

    let years = fixture.data("/api/students/years").await;
    assert_eq!(years, json!(["2023-2024"]));

    let chart = fixture.data("/api/students/charts/levels").await;
    assert_eq!(chart["labels"], json!(["FIE3", "FIE4"]));
    assert_eq!(chart["values"], json!([2.0, 1.0]));

    let resp = fixture
        .get("/api/students/charts/unknown")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_student_crud() {
    let fixture = TestFixture::new().await;

    // Gender is required on create
    let resp = fixture
        .post("/api/students")
        .json(&json!({"last_name": "Martin", "first_name": "Luc", "level": "FIE1", "year": "2024-2025"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .post("/api/students")
        .json(&json!({
            "id": "forged",
            "last_name": "Martin",
            "first_name": "Luc",
            "gender": "Masculin",
            "level": "FIE1",
            "year": "2024-2025"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_ne!(id, "forged");
    assert_eq!(body["data"]["created_by"], ADMIN);

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/students/{}", id)))
        .bearer_auth(&fixture.token)
        .json(&json!({"level": "FIE2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let student = fixture.data(&format!("/api/students/{}", id)).await;
    assert_eq!(student["level"], "FIE2");
    assert_eq!(student["last_name"], "Martin");
    assert_eq!(student["updated_by"], ADMIN);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/students/{}", id)))
        .bearer_auth(&fixture.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .get(&format!("/api/students/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// ==================== RSE ====================

#[tokio::test]
async fn test_rse_import_upserts_by_natural_key() {
    let fixture = TestFixture::new().await;

    let record = |hours: &str| {
        json!({"records": [{
            "year": "2024",
            "promotion": "FIE3",
            "semester": "S1",
            "activity_type": "Projet",
            "lecture_hours": hours,
            "tutorial_hours": 2
        }]})
    };

    let resp = fixture
        .post("/api/rse/import")
        .json(&record("4"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["inserted"], 1);

    let resp = fixture
        .post("/api/rse/import")
        .json(&record("6"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["updated"], 1);

    let activities = fixture.data("/api/rse").await;
    let activities = activities.as_array().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["lecture_hours"], 6.0);
    assert_eq!(activities[0]["total_hours"], 8.0);

    let stats = fixture.data("/api/rse/stats").await;
    assert_eq!(stats["total_hours"], 8.0);
    assert_eq!(stats["activity_count"], 1);

    let resp = fixture
        .post("/api/rse/import")
        .json(&json!({"records": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_rse_maquette_upload() {
    let fixture = TestFixture::new().await;
    let csv = "promotion_semestre;activite;cm_maquette;td_maquette;cm_hors_maquette;td1;td2;td3;td4;td5;total_heures\n\
               FIE3-S5;Fresque du climat;2;3;1;1;0;2;0;0;9\n";

    let (status, body) = fixture
        .upload("/api/rse/upload", file_form("maquette_rse.csv", csv))
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["inserted"], 1);

    let activities = fixture.data("/api/rse").await;
    let activity = &activities[0];
    assert_eq!(activity["promotion"], "FIE3");
    assert_eq!(activity["semester"], "S5");
    assert_eq!(activity["lecture_hours"], 3.0);
    assert_eq!(activity["tutorial_hours"], 4.0);
    assert_eq!(activity["lab_hours"], 2.0);
    assert_eq!(activity["total_hours"], 9.0);
}

// ==================== ARION ====================

#[tokio::test]
async fn test_arion_upload_default_year() {
    let fixture = TestFixture::new().await;
    let csv = "activite,groupe,code_y,niveau,date,duree,statut,formateur\n\
               Soudure,G1,Y12,FIE1,2024-03-05,3,Validé,Bernard\n\
               Electricite,G2,Y13,FIE2,05/04/2024,2,,Bernard\n";

    // Without a year column or default_year the import is refused
    let (status, body) = fixture
        .upload("/api/arion/upload", file_form("arion.csv", csv))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"]["message"].as_str().unwrap().contains("Line"));
    assert!(fixture.data("/api/arion").await.as_array().unwrap().is_empty());

    let form = file_form("arion.csv", csv).text("default_year", "2024");
    let (status, body) = fixture.upload("/api/arion/upload", form).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["inserted"], 2);

    let sessions = fixture.data("/api/arion?trainer=bern").await;
    assert_eq!(sessions.as_array().unwrap().len(), 2);
    assert!(sessions
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["year"] == "2024"));

    let stats = fixture.data("/api/arion/stats").await;
    assert_eq!(stats["summary"]["activity_count"], 2);
    assert_eq!(stats["summary"]["total_duration"], 5.0);

    let monthly = fixture.data("/api/arion/monthly?year=2024").await;
    assert_eq!(monthly["values"][2], 1.0);
    assert_eq!(monthly["values"][3], 1.0);
}

// ==================== VACATAIRES ====================

#[tokio::test]
async fn test_vacataire_semicolon_upload() {
    let fixture = TestFixture::new().await;
    let csv = "Nom;Prénom;Adresse mail;Type de profession;Pays;Nombre d'heures estimées;Statut\n\
               Martin;Paul;paul@x.fr;Ingénieur;France;12;CDI\n\
               Roy;Ana;ana@x.fr;Chercheur;Canada;20;\n";

    let (status, body) = fixture
        .upload("/api/vacataires/upload", file_form("vacataires.csv", csv))
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["inserted"], 2);

    let vacataires = fixture.data("/api/vacataires").await;
    let paul = vacataires
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["first_name"] == "Paul")
        .unwrap()
        .clone();
    assert_eq!(paul["email"], "paul@x.fr");
    assert_eq!(paul["Statut"], "CDI");

    let stats = fixture.data("/api/vacataires/stats").await;
    assert_eq!(stats["hours"]["labels"], json!(["Ana Roy", "Paul Martin"]));
    assert_eq!(stats["hours"]["values"], json!([20.0, 12.0]));
    assert_eq!(stats["country"]["labels"], json!(["Canada", "France"]));
}

// ==================== SPECIAL CATEGORIES ====================

#[tokio::test]
async fn test_special_category_from_filename() {
    let fixture = TestFixture::new().await;
    let csv = "Prénom,Nom,Etablissement,Adresse mail\nLea,Blanc,INSA,lea@insa.fr\n";

    let (status, body) = fixture
        .upload(
            "/api/special-categories/upload",
            file_form("liste_convention_2024.csv", csv),
        )
        .await;
    assert_eq!(status, 200, "{}", body);

    let records = fixture
        .data("/api/special-categories?category=convention")
        .await;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    let id = records[0]["id"].as_str().unwrap();

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/special-categories/{}", id)))
        .bearer_auth(&fixture.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Convention lists must carry the establishment column
    let (status, _) = fixture
        .upload(
            "/api/special-categories/upload",
            file_form("convention.csv", "Prénom,Nom\nLea,Blanc\n"),
        )
        .await;
    assert_eq!(status, 400);
}
